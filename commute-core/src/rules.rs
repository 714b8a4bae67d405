//! Ordered rule cascades for both stages and the shared fallback.
//!
//! Every resolver here is a pure function over the drawn assignment and the
//! live facts. A cascade walks its rule table in print order, stops at the
//! first rule that produces a slot, and falls through to the shared fallback
//! when none does, so resolution always yields exactly one slot.
use serde::{Deserialize, Serialize};

use crate::assignment::{Assignment, CommuteMethod};
use crate::constants::{
    BATTERY_TRAIN_MIN, BUS_RIDE_MIN_REMAINING_SECS, FALLBACK_BOTTOM_LEFT_SLOT,
    FALLBACK_EVEN_MINUTE_SHIFT, FALLBACK_TOP_LEFT_SLOT, INDICATOR_BOB, INDICATOR_CAR,
    REVERSE_DIGIT_LIMIT, SECONDS_PER_MINUTE, VOWELS,
};
use crate::facts::{FactSource, PortKind};

/// Stage 1 rules, named for their triggering condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage1Rule {
    /// Indicator BOB is not lit (unlit or absent entirely).
    UnlitBob,
    /// More than two batteries on the casing.
    Batteries,
    /// Indicator CAR is present and lit.
    LitCar,
    /// A stereo RCA port is present.
    StereoRca,
    /// Unconditional once reached.
    Walk,
}

/// Print order of the stage 1 cascade.
pub const STAGE1_ORDER: [Stage1Rule; 5] = [
    Stage1Rule::UnlitBob,
    Stage1Rule::Batteries,
    Stage1Rule::LitCar,
    Stage1Rule::StereoRca,
    Stage1Rule::Walk,
];

impl Stage1Rule {
    /// Stable key identifying the rule in logs and reports.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::UnlitBob => "stage1.unlit-bob",
            Self::Batteries => "stage1.batteries",
            Self::LitCar => "stage1.lit-car",
            Self::StereoRca => "stage1.stereo-rca",
            Self::Walk => "stage1.walk",
        }
    }

    /// Method this rule directs the player to.
    #[must_use]
    pub const fn method(self) -> CommuteMethod {
        match self {
            Self::UnlitBob => CommuteMethod::Bus,
            Self::Batteries => CommuteMethod::Train,
            Self::LitCar => CommuteMethod::Car,
            Self::StereoRca => CommuteMethod::Cycle,
            Self::Walk => CommuteMethod::Walk,
        }
    }

    fn try_slot(self, assignment: &Assignment, facts: &impl FactSource) -> Option<usize> {
        let condition = match self {
            Self::UnlitBob => !facts.indicator_state(INDICATOR_BOB).is_lit(),
            Self::Batteries => facts.battery_count() >= BATTERY_TRAIN_MIN,
            Self::LitCar => facts.indicator_state(INDICATOR_CAR).is_lit(),
            Self::StereoRca => facts.port_present(PortKind::StereoRca),
            Self::Walk => true,
        };
        if !condition {
            return None;
        }
        // A rule whose method was left off the buttons cannot match.
        assignment.slot_of(self.method())
    }
}

/// Stage 2 rules, named as printed in the manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage2Rule {
    /// Stage 1 answered walk and cycle is assigned.
    WalkToCycle,
    /// Stage 1 answered car; press the same button again.
    CarToCar,
    /// Train is assigned, regardless of history.
    UnconditionalTrain,
    /// Stage 1 answered bus and walk is assigned.
    BusToWalk,
    /// Stage 1 answered train with enough time left for the bus.
    TrainTicketRideBus,
}

/// Print order when the serial's last numeral is 6 or higher.
pub const STAGE2_NORMAL_ORDER: [Stage2Rule; 5] = [
    Stage2Rule::WalkToCycle,
    Stage2Rule::CarToCar,
    Stage2Rule::UnconditionalTrain,
    Stage2Rule::BusToWalk,
    Stage2Rule::TrainTicketRideBus,
];

/// Print order when the serial's last numeral is below 6.
///
/// This is the literal printed order, not a mirror of the normal one: note
/// that car-to-car still outranks the unconditional train rule.
pub const STAGE2_REVERSE_ORDER: [Stage2Rule; 5] = [
    Stage2Rule::TrainTicketRideBus,
    Stage2Rule::BusToWalk,
    Stage2Rule::CarToCar,
    Stage2Rule::UnconditionalTrain,
    Stage2Rule::WalkToCycle,
];

impl Stage2Rule {
    /// Stable key identifying the rule in logs and reports.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::WalkToCycle => "stage2.walk-to-cycle",
            Self::CarToCar => "stage2.car-to-car",
            Self::UnconditionalTrain => "stage2.unconditional-train",
            Self::BusToWalk => "stage2.bus-to-walk",
            Self::TrainTicketRideBus => "stage2.train-ticket-ride-bus",
        }
    }

    fn try_slot(
        self,
        assignment: &Assignment,
        facts: &impl FactSource,
        stage1_slot: usize,
    ) -> Option<usize> {
        match self {
            Self::WalkToCycle => {
                if assignment.slot_of(CommuteMethod::Walk) != Some(stage1_slot) {
                    return None;
                }
                assignment.slot_of(CommuteMethod::Cycle)
            }
            Self::CarToCar => {
                if assignment.slot_of(CommuteMethod::Car) != Some(stage1_slot) {
                    return None;
                }
                Some(stage1_slot)
            }
            Self::UnconditionalTrain => assignment.slot_of(CommuteMethod::Train),
            Self::BusToWalk => {
                if assignment.slot_of(CommuteMethod::Bus) != Some(stage1_slot) {
                    return None;
                }
                assignment.slot_of(CommuteMethod::Walk)
            }
            Self::TrainTicketRideBus => {
                if assignment.slot_of(CommuteMethod::Train) != Some(stage1_slot) {
                    return None;
                }
                if facts.remaining_seconds() <= BUS_RIDE_MIN_REMAINING_SECS {
                    return None;
                }
                assignment.slot_of(CommuteMethod::Bus)
            }
        }
    }
}

/// Which printed stage 2 cascade applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeVariant {
    Normal,
    Reverse,
}

impl CascadeVariant {
    /// Select the variant from the serial's last numeral, read fresh.
    ///
    /// A serial without numerals has no digit below the limit, so it reads
    /// the normal cascade.
    #[must_use]
    pub fn from_facts(facts: &impl FactSource) -> Self {
        match facts.serial_numerals().last() {
            Some(&digit) if digit < REVERSE_DIGIT_LIMIT => Self::Reverse,
            _ => Self::Normal,
        }
    }

    /// Rule table read by this variant.
    #[must_use]
    pub const fn order(self) -> &'static [Stage2Rule; 5] {
        match self {
            Self::Normal => &STAGE2_NORMAL_ORDER,
            Self::Reverse => &STAGE2_REVERSE_ORDER,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Reverse => "reverse",
        }
    }
}

impl std::fmt::Display for CascadeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the rule that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleId {
    Stage1(Stage1Rule),
    Stage2(Stage2Rule),
    Fallback,
}

impl RuleId {
    /// Stable key identifying the rule in logs and reports.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Stage1(rule) => rule.key(),
            Self::Stage2(rule) => rule.key(),
            Self::Fallback => "fallback",
        }
    }
}

/// Resolution of one stage against the live facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Reading-order slot of the button to press.
    pub slot: usize,
    /// Rule that decided it.
    pub rule: RuleId,
}

/// Resolve the stage 1 cascade against the live facts.
#[must_use]
pub fn stage1_verdict(assignment: &Assignment, facts: &impl FactSource) -> Verdict {
    for rule in STAGE1_ORDER {
        if let Some(slot) = rule.try_slot(assignment, facts) {
            return Verdict {
                slot,
                rule: RuleId::Stage1(rule),
            };
        }
    }
    Verdict {
        slot: fallback_slot(facts),
        rule: RuleId::Fallback,
    }
}

/// Resolve the stage 2 cascade for the recorded stage 1 answer.
#[must_use]
pub fn stage2_verdict(
    assignment: &Assignment,
    facts: &impl FactSource,
    stage1_slot: usize,
) -> Verdict {
    let variant = CascadeVariant::from_facts(facts);
    for rule in *variant.order() {
        if let Some(slot) = rule.try_slot(assignment, facts, stage1_slot) {
            return Verdict {
                slot,
                rule: RuleId::Stage2(rule),
            };
        }
    }
    Verdict {
        slot: fallback_slot(facts),
        rule: RuleId::Fallback,
    }
}

/// Shared fall-through slot, computed from facts alone.
///
/// Ignores the assignment and stage history entirely. The vowel check is a
/// presence test over the whole serial; later consonants never reset it.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn fallback_slot(facts: &impl FactSource) -> usize {
    let mut slot = FALLBACK_TOP_LEFT_SLOT;
    if facts
        .serial_letters()
        .iter()
        .any(|c| VOWELS.contains(&c.to_ascii_uppercase()))
    {
        slot = FALLBACK_BOTTOM_LEFT_SLOT;
    }
    let minutes = (facts.remaining_seconds().max(0.0) / SECONDS_PER_MINUTE) as u32;
    if minutes % 2 == 0 {
        slot += FALLBACK_EVEN_MINUTE_SHIFT;
    }
    slot
}
