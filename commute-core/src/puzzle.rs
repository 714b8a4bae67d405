//! Press-adjudicating state machine owning the drawn assignment.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::assignment::{Assignment, AssignmentError, CommuteMethod};
use crate::constants::{
    DEBUG_ENV_VAR, LOG_MODULE_ARMED, LOG_MODULE_SOLVED, LOG_PRESS_CORRECT, LOG_PRESS_IGNORED,
    LOG_PRESS_STRIKE, LOG_RULE_PREFIX, LOG_STAGE_GUARD,
};
use crate::facts::FactSource;
use crate::rules::{Verdict, stage1_verdict, stage2_verdict};

#[cfg(debug_assertions)]
fn debug_log_enabled() -> bool {
    matches!(std::env::var(DEBUG_ENV_VAR), Ok(val) if val != "0")
}

#[cfg(not(debug_assertions))]
const fn debug_log_enabled() -> bool {
    false
}

/// Lifecycle stage of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Unarmed,
    Stage1,
    Stage2,
    Solved,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unarmed => "unarmed",
            Self::Stage1 => "stage1",
            Self::Stage2 => "stage2",
            Self::Solved => "solved",
        }
    }

    /// Whether presses can no longer change the outcome.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Solved)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adjudication of a single button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressOutcome {
    /// The press matched the live verdict and advanced the stage.
    Correct,
    /// The press missed the live verdict; the host should signal a strike.
    Incorrect,
    /// The final press landed and the module is finished.
    Solved,
    /// The press carried no information and must not be penalized.
    Ignored,
}

impl PressOutcome {
    /// Whether the host should signal a strike for this outcome.
    #[must_use]
    pub const fn is_strike(self) -> bool {
        matches!(self, Self::Incorrect)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
            Self::Solved => "solved",
            Self::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for PressOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable ledger for one module instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PuzzleState {
    #[serde(default)]
    pub stage: Stage,
    /// Slot accepted as the stage 1 answer, fixed at the accepting press.
    /// Stage 2 rules read this historical value, never a recomputation.
    #[serde(default)]
    pub stage1_answer: Option<usize>,
    /// Slot the most recent adjudication considered correct.
    #[serde(default)]
    pub last_verdict: Option<usize>,
    /// Stable log keys in arrival order; the host renders them.
    #[serde(default)]
    pub logs: Vec<String>,
}

/// A single Commute module instance: the drawn assignment plus its ledger.
///
/// Presses are adjudicated synchronously against facts re-read at the moment
/// of the press; the engine caches nothing about the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommutePuzzle {
    assignment: Assignment,
    state: PuzzleState,
}

impl CommutePuzzle {
    /// Draw an assignment for `button_count` buttons and arm the module.
    ///
    /// # Errors
    ///
    /// Returns an error when `button_count` is zero or exceeds the method set.
    pub fn new<R: Rng>(button_count: usize, rng: &mut R) -> Result<Self, AssignmentError> {
        Self::with_observer(button_count, rng, |_, _| {})
    }

    /// Draw an assignment, announcing each button as it is fixed, then arm.
    ///
    /// The observer fires once per slot in reading order so the presentation
    /// layer can stage its reveal.
    ///
    /// # Errors
    ///
    /// Returns an error when `button_count` is zero or exceeds the method set.
    pub fn with_observer<R, F>(
        button_count: usize,
        rng: &mut R,
        on_assign: F,
    ) -> Result<Self, AssignmentError>
    where
        R: Rng,
        F: FnMut(usize, CommuteMethod),
    {
        let assignment = Assignment::generate_with(rng, button_count, on_assign)?;
        let state = PuzzleState {
            stage: Stage::Stage1,
            logs: vec![String::from(LOG_MODULE_ARMED)],
            ..PuzzleState::default()
        };
        Ok(Self { assignment, state })
    }

    /// Deterministically arm an instance from a bare seed.
    ///
    /// # Errors
    ///
    /// Returns an error when `button_count` is zero or exceeds the method set.
    pub fn from_seed(button_count: usize, seed: u64) -> Result<Self, AssignmentError> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        Self::new(button_count, &mut rng)
    }

    /// Rehydrate an instance from a stored assignment and ledger.
    #[must_use]
    pub const fn from_parts(assignment: Assignment, state: PuzzleState) -> Self {
        Self { assignment, state }
    }

    /// The drawn slot-to-method assignment.
    #[must_use]
    pub const fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Read-only view of the ledger.
    #[must_use]
    pub const fn state(&self) -> &PuzzleState {
        &self.state
    }

    /// Mutable ledger access for hosts that drain logs.
    pub const fn state_mut(&mut self) -> &mut PuzzleState {
        &mut self.state
    }

    /// Current lifecycle stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.state.stage
    }

    /// Whether the module has been solved.
    #[must_use]
    pub const fn is_solved(&self) -> bool {
        self.state.stage.is_terminal()
    }

    /// Consume the instance, keeping only the serializable ledger.
    #[must_use]
    pub fn into_state(self) -> PuzzleState {
        self.state
    }

    /// Adjudicate a press on `slot` against the live facts.
    ///
    /// Facts are re-read here on every call, so a drifting timer or changed
    /// environment is reflected in the verdict of each individual press.
    pub fn press(&mut self, slot: usize, facts: &impl FactSource) -> PressOutcome {
        match self.state.stage {
            Stage::Unarmed | Stage::Solved => self.ignore_press(slot),
            Stage::Stage1 | Stage::Stage2 if slot >= self.assignment.slot_count() => {
                self.ignore_press(slot)
            }
            Stage::Stage1 => self.press_stage1(slot, facts),
            Stage::Stage2 => self.press_stage2(slot, facts),
        }
    }

    fn ignore_press(&mut self, slot: usize) -> PressOutcome {
        self.state.logs.push(String::from(LOG_PRESS_IGNORED));
        if debug_log_enabled() {
            println!(
                "Ignored press on slot {slot} while {}",
                self.state.stage.as_str()
            );
        }
        PressOutcome::Ignored
    }

    fn press_stage1(&mut self, slot: usize, facts: &impl FactSource) -> PressOutcome {
        let verdict = stage1_verdict(&self.assignment, facts);
        self.record_verdict(verdict);
        if slot != verdict.slot {
            return self.strike(slot, verdict);
        }
        self.state.stage1_answer = Some(verdict.slot);
        self.state.stage = Stage::Stage2;
        self.state.logs.push(String::from(LOG_PRESS_CORRECT));
        if debug_log_enabled() {
            println!(
                "Stage 1 cleared: slot {slot} via {} -> stage 2",
                verdict.rule.key()
            );
        }
        PressOutcome::Correct
    }

    fn press_stage2(&mut self, slot: usize, facts: &impl FactSource) -> PressOutcome {
        let Some(stage1_slot) = self.state.stage1_answer else {
            // Only reachable through a rehydrated ledger that skipped stage 1.
            self.state.logs.push(String::from(LOG_STAGE_GUARD));
            self.solve();
            return PressOutcome::Solved;
        };
        let verdict = stage2_verdict(&self.assignment, facts, stage1_slot);
        self.record_verdict(verdict);
        if slot != verdict.slot {
            return self.strike(slot, verdict);
        }
        self.solve();
        if debug_log_enabled() {
            println!("Stage 2 cleared: slot {slot} via {}", verdict.rule.key());
        }
        PressOutcome::Solved
    }

    fn strike(&mut self, slot: usize, verdict: Verdict) -> PressOutcome {
        self.state.logs.push(String::from(LOG_PRESS_STRIKE));
        if debug_log_enabled() {
            println!(
                "Strike: pressed slot {slot}, verdict was slot {} via {}",
                verdict.slot,
                verdict.rule.key()
            );
        }
        PressOutcome::Incorrect
    }

    fn solve(&mut self) {
        self.state.stage = Stage::Solved;
        self.state.logs.push(String::from(LOG_MODULE_SOLVED));
    }

    fn record_verdict(&mut self, verdict: Verdict) {
        self.state.last_verdict = Some(verdict.slot);
        self.state
            .logs
            .push(format!("{LOG_RULE_PREFIX}{}", verdict.rule.key()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{Edgework, Indicator};
    use crate::rules::{stage1_verdict, stage2_verdict};

    fn quiet_edgework() -> Edgework {
        // BOB lit and CAR unlit so stage 1 resolves through the walk rule.
        Edgework {
            serial: String::from("XY3ZQ8"),
            batteries: 1,
            indicators: vec![Indicator::new("BOB", true), Indicator::new("CAR", false)],
            timer_seconds: 400.0,
            ..Edgework::default()
        }
    }

    #[test]
    fn arming_pushes_the_armed_log() {
        let puzzle = CommutePuzzle::from_seed(4, 1337).expect("arm");
        assert_eq!(puzzle.stage(), Stage::Stage1);
        assert_eq!(puzzle.state().logs, vec![String::from(LOG_MODULE_ARMED)]);
    }

    #[test]
    fn from_seed_is_deterministic() {
        let a = CommutePuzzle::from_seed(4, 99).expect("arm");
        let b = CommutePuzzle::from_seed(4, 99).expect("arm");
        assert_eq!(a.assignment(), b.assignment());
    }

    #[test]
    fn correct_stage1_press_records_the_answer() {
        let mut puzzle = CommutePuzzle::from_seed(4, 7).expect("arm");
        let edgework = quiet_edgework();
        let verdict = stage1_verdict(puzzle.assignment(), &edgework);

        let outcome = puzzle.press(verdict.slot, &edgework);
        assert_eq!(outcome, PressOutcome::Correct);
        assert_eq!(puzzle.stage(), Stage::Stage2);
        assert_eq!(puzzle.state().stage1_answer, Some(verdict.slot));
        assert_eq!(puzzle.state().last_verdict, Some(verdict.slot));
    }

    #[test]
    fn wrong_stage1_press_strikes_and_stays() {
        let mut puzzle = CommutePuzzle::from_seed(4, 7).expect("arm");
        let edgework = quiet_edgework();
        let verdict = stage1_verdict(puzzle.assignment(), &edgework);
        let wrong = (verdict.slot + 1) % puzzle.assignment().slot_count();

        let outcome = puzzle.press(wrong, &edgework);
        assert_eq!(outcome, PressOutcome::Incorrect);
        assert!(outcome.is_strike());
        assert_eq!(puzzle.stage(), Stage::Stage1);
        assert_eq!(
            puzzle.state().stage1_answer,
            None,
            "a struck press must not bind the answer"
        );
    }

    #[test]
    fn full_solve_reaches_the_terminal_stage() {
        let mut puzzle = CommutePuzzle::from_seed(4, 7).expect("arm");
        let edgework = quiet_edgework();

        let first = stage1_verdict(puzzle.assignment(), &edgework);
        assert_eq!(puzzle.press(first.slot, &edgework), PressOutcome::Correct);

        let second = stage2_verdict(puzzle.assignment(), &edgework, first.slot);
        assert_eq!(puzzle.press(second.slot, &edgework), PressOutcome::Solved);
        assert!(puzzle.is_solved());

        // Further presses are inert.
        assert_eq!(puzzle.press(second.slot, &edgework), PressOutcome::Ignored);
        assert_eq!(puzzle.stage(), Stage::Solved);
    }

    #[test]
    fn out_of_range_slot_is_ignored_without_penalty() {
        let mut puzzle = CommutePuzzle::from_seed(4, 7).expect("arm");
        let edgework = quiet_edgework();
        let outcome = puzzle.press(9, &edgework);
        assert_eq!(outcome, PressOutcome::Ignored);
        assert!(!outcome.is_strike());
        assert_eq!(puzzle.stage(), Stage::Stage1);
    }

    #[test]
    fn unarmed_instance_ignores_presses() {
        let assignment = Assignment::from_methods(&[CommuteMethod::Walk, CommuteMethod::Bus])
            .expect("fixture");
        let mut puzzle = CommutePuzzle::from_parts(assignment, PuzzleState::default());
        assert_eq!(puzzle.stage(), Stage::Unarmed);
        assert_eq!(puzzle.press(0, &quiet_edgework()), PressOutcome::Ignored);
    }

    #[test]
    fn stage2_without_recorded_answer_auto_solves() {
        let assignment = Assignment::from_methods(&[
            CommuteMethod::Walk,
            CommuteMethod::Cycle,
            CommuteMethod::Car,
            CommuteMethod::Bus,
        ])
        .expect("fixture");
        let state = PuzzleState {
            stage: Stage::Stage2,
            ..PuzzleState::default()
        };
        let mut puzzle = CommutePuzzle::from_parts(assignment, state);

        let outcome = puzzle.press(0, &quiet_edgework());
        assert_eq!(outcome, PressOutcome::Solved);
        assert!(puzzle.is_solved());
        assert!(
            puzzle.state().logs.contains(&String::from(LOG_STAGE_GUARD)),
            "the guard must leave a trace in the ledger"
        );
    }

    #[test]
    fn rule_keys_land_in_the_ledger() {
        let mut puzzle = CommutePuzzle::from_seed(4, 7).expect("arm");
        let edgework = quiet_edgework();
        let verdict = stage1_verdict(puzzle.assignment(), &edgework);
        let _ = puzzle.press(verdict.slot, &edgework);
        let expected = format!("{LOG_RULE_PREFIX}{}", verdict.rule.key());
        assert!(puzzle.state().logs.contains(&expected));
    }

    #[test]
    fn ledger_roundtrips_through_serde() {
        let mut puzzle = CommutePuzzle::from_seed(4, 21).expect("arm");
        let edgework = quiet_edgework();
        let verdict = stage1_verdict(puzzle.assignment(), &edgework);
        let _ = puzzle.press(verdict.slot, &edgework);

        let json = serde_json::to_string(&puzzle).expect("serialize");
        let restored: CommutePuzzle = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, puzzle);
        assert_eq!(restored.stage(), Stage::Stage2);
    }
}
