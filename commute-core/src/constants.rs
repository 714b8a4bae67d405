//! Centralized rule thresholds and log keys for the Commute engine.
//!
//! These values pin the deterministic math of the cascades. Keeping them
//! together ensures the puzzle can only be rebalanced via code changes
//! reviewed in version control, rather than through external assets.

// Logging keys -------------------------------------------------------------
pub(crate) const DEBUG_ENV_VAR: &str = "COMMUTE_DEBUG_LOGS";
pub(crate) const LOG_MODULE_ARMED: &str = "log.module.armed";
pub(crate) const LOG_MODULE_SOLVED: &str = "log.module.solved";
pub(crate) const LOG_PRESS_IGNORED: &str = "log.press.ignored";
pub(crate) const LOG_PRESS_CORRECT: &str = "log.press.correct";
pub(crate) const LOG_PRESS_STRIKE: &str = "log.press.strike";
pub(crate) const LOG_STAGE_GUARD: &str = "log.stage.guard";
pub(crate) const LOG_RULE_PREFIX: &str = "log.rule.";

// Stage 1 tuning -----------------------------------------------------------
pub(crate) const INDICATOR_BOB: &str = "BOB";
pub(crate) const INDICATOR_CAR: &str = "CAR";
pub(crate) const BATTERY_TRAIN_MIN: u32 = 3;

// Stage 2 tuning -----------------------------------------------------------
pub(crate) const REVERSE_DIGIT_LIMIT: u8 = 6;
pub(crate) const BUS_RIDE_MIN_REMAINING_SECS: f32 = 300.0;

// Fallback rule ------------------------------------------------------------
pub(crate) const FALLBACK_TOP_LEFT_SLOT: usize = 0;
pub(crate) const FALLBACK_BOTTOM_LEFT_SLOT: usize = 2;
pub(crate) const FALLBACK_EVEN_MINUTE_SHIFT: usize = 1;
pub(crate) const SECONDS_PER_MINUTE: f32 = 60.0;
pub(crate) const VOWELS: &[char] = &['A', 'E', 'I', 'O', 'U'];
