//! Deterministic instance driver behind every sweep scenario.
//!
//! Each instance arms a fresh module from seeded streams, generates random
//! edgework, then plays it: optionally a burst of noise presses first, then a
//! perfect manual follower until the module is solved. The timer drains a
//! random few seconds between presses so verdicts are re-read against moving
//! facts, exactly as a live defusal would see them.

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

use commute_core::{
    Assignment, CascadeVariant, CommutePuzzle, Edgework, Indicator, PORT_ORDER, PressOutcome,
    Stage, stage1_verdict, stage2_verdict,
};

use crate::streams::SweepStreams;

const SERIAL_LENGTH: usize = 6;
const SERIAL_POOL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SERIAL_DIGITS: &[u8] = b"0123456789";
const INDICATOR_LABELS: [&str; 3] = ["BOB", "CAR", "FRK"];
const INDICATOR_ODDS: f64 = 0.5;
const INDICATOR_LIT_ODDS: f64 = 0.5;
const PORT_ODDS: f64 = 0.35;
const MAX_BATTERIES: u32 = 6;
const MIN_TIMER_SECONDS: f32 = 60.0;
const MAX_TIMER_SECONDS: f32 = 600.0;
const MIN_PRESS_GAP_SECONDS: f32 = 4.0;
const MAX_PRESS_GAP_SECONDS: f32 = 12.0;
const MAX_PRESSES: usize = 64;

/// One adjudicated press inside a sweep instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressRecord {
    pub stage: Stage,
    pub slot: usize,
    pub outcome: PressOutcome,
    /// Timer reading at the moment of the press.
    pub remaining_seconds: f32,
    /// Log key of the rule behind the live verdict, when one was consulted.
    pub rule_key: Option<String>,
}

/// Full record of one simulated module instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub seed: u64,
    pub assignment: Assignment,
    /// Edgework as generated, before any timer drain.
    pub edgework: Edgework,
    pub variant: CascadeVariant,
    pub presses: Vec<PressRecord>,
    pub strikes: usize,
    pub solved: bool,
    pub logs: Vec<String>,
}

/// Drives seeded module instances and records what happened.
pub struct ModuleTester {
    verbose: bool,
}

impl ModuleTester {
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Run one instance: `noise_presses` random pokes, then follow the manual.
    ///
    /// # Errors
    ///
    /// Fails when `button_count` cannot form a valid assignment.
    pub fn run_instance(
        &self,
        seed: u64,
        button_count: usize,
        noise_presses: usize,
    ) -> Result<InstanceSummary> {
        let streams = SweepStreams::from_user_seed(seed);
        let mut puzzle = CommutePuzzle::new(button_count, &mut *streams.assignment())?;
        let mut edgework = random_edgework(&mut *streams.edgework());
        let starting_edgework = edgework.clone();
        let variant = CascadeVariant::from_facts(&edgework);

        let mut presses: Vec<PressRecord> = Vec::new();

        for _ in 0..noise_presses {
            if puzzle.is_solved() {
                break;
            }
            let slot = streams.timer().gen_range(0..=button_count);
            presses.push(press_and_record(&mut puzzle, &edgework, slot));
            drain_between_presses(&mut edgework, &streams);
        }

        while !puzzle.is_solved() && presses.len() < MAX_PRESSES {
            let slot = live_target(&puzzle, &edgework);
            presses.push(press_and_record(&mut puzzle, &edgework, slot));
            drain_between_presses(&mut edgework, &streams);
        }

        let strikes = presses
            .iter()
            .filter(|press| press.outcome.is_strike())
            .count();
        let solved = puzzle.is_solved();

        if self.verbose {
            println!(
                "  🎛️  seed {seed}: {} presses, {strikes} strikes, {} rng draws",
                presses.len(),
                streams.total_draws()
            );
        }
        log::debug!(
            "instance seed={seed} buttons={button_count} noise={noise_presses} presses={} solved={solved}",
            presses.len()
        );

        Ok(InstanceSummary {
            seed,
            assignment: puzzle.assignment().clone(),
            edgework: starting_edgework,
            variant,
            presses,
            strikes,
            solved,
            logs: puzzle.into_state().logs,
        })
    }
}

/// Draw a random but plausible edgework snapshot.
///
/// Serials are six characters ending in a digit so the cascade variant is
/// exercised from both sides. Indicator labels beyond BOB and CAR are noise
/// the rules must look past.
pub fn random_edgework(rng: &mut impl Rng) -> Edgework {
    let mut serial = String::with_capacity(SERIAL_LENGTH);
    for _ in 0..SERIAL_LENGTH - 1 {
        let index = rng.gen_range(0..SERIAL_POOL.len());
        serial.push(char::from(SERIAL_POOL[index]));
    }
    let digit = rng.gen_range(0..SERIAL_DIGITS.len());
    serial.push(char::from(SERIAL_DIGITS[digit]));

    let mut indicators = Vec::new();
    for label in INDICATOR_LABELS {
        if rng.gen_bool(INDICATOR_ODDS) {
            indicators.push(Indicator::new(label, rng.gen_bool(INDICATOR_LIT_ODDS)));
        }
    }

    let mut ports = Vec::new();
    for port in PORT_ORDER {
        if rng.gen_bool(PORT_ODDS) {
            ports.push(port);
        }
    }

    Edgework {
        serial,
        batteries: rng.gen_range(0..=MAX_BATTERIES),
        indicators,
        ports,
        timer_seconds: rng.gen_range(MIN_TIMER_SECONDS..MAX_TIMER_SECONDS),
    }
}

fn live_target(puzzle: &CommutePuzzle, facts: &Edgework) -> usize {
    match puzzle.stage() {
        Stage::Stage1 => stage1_verdict(puzzle.assignment(), facts).slot,
        Stage::Stage2 => match puzzle.state().stage1_answer {
            Some(answer) => stage2_verdict(puzzle.assignment(), facts, answer).slot,
            // Any in-range press trips the missing-answer guard.
            None => 0,
        },
        Stage::Unarmed | Stage::Solved => 0,
    }
}

fn press_and_record(puzzle: &mut CommutePuzzle, facts: &Edgework, slot: usize) -> PressRecord {
    let stage = puzzle.stage();
    let rule_key = consulted_rule_key(puzzle, facts, slot);
    let outcome = puzzle.press(slot, facts);
    PressRecord {
        stage,
        slot,
        outcome,
        remaining_seconds: facts.timer_seconds,
        rule_key,
    }
}

/// Mirror of the verdict the engine is about to consult, for the record.
fn consulted_rule_key(puzzle: &CommutePuzzle, facts: &Edgework, slot: usize) -> Option<String> {
    if slot >= puzzle.assignment().slot_count() {
        return None;
    }
    match puzzle.stage() {
        Stage::Stage1 => Some(
            stage1_verdict(puzzle.assignment(), facts)
                .rule
                .key()
                .to_string(),
        ),
        Stage::Stage2 => puzzle.state().stage1_answer.map(|answer| {
            stage2_verdict(puzzle.assignment(), facts, answer)
                .rule
                .key()
                .to_string()
        }),
        Stage::Unarmed | Stage::Solved => None,
    }
}

fn drain_between_presses(edgework: &mut Edgework, streams: &SweepStreams) {
    let gap = streams
        .timer()
        .gen_range(MIN_PRESS_GAP_SECONDS..MAX_PRESS_GAP_SECONDS);
    edgework.drain_timer(gap);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn random_edgework_stays_in_shape() {
        for seed in 0..50 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let edgework = random_edgework(&mut rng);
            assert_eq!(edgework.serial.len(), SERIAL_LENGTH);
            assert!(
                edgework.serial.chars().last().is_some_and(|c| c.is_ascii_digit()),
                "serial {} should end in a digit",
                edgework.serial
            );
            assert!(edgework.validate().is_ok());
            assert!(edgework.batteries <= MAX_BATTERIES);
            assert!(edgework.timer_seconds >= MIN_TIMER_SECONDS);
            assert!(edgework.timer_seconds < MAX_TIMER_SECONDS);
        }
    }

    #[test]
    fn manual_follower_solves_in_two_presses() {
        let tester = ModuleTester::new(false);
        for seed in 0..40 {
            let summary = tester.run_instance(seed, 4, 0).expect("instance");
            assert!(summary.solved, "seed {seed} did not solve");
            assert_eq!(summary.strikes, 0);
            assert_eq!(summary.presses.len(), 2, "seed {seed} took extra presses");
            assert_eq!(summary.presses[0].outcome, PressOutcome::Correct);
            assert_eq!(summary.presses[1].outcome, PressOutcome::Solved);
            assert!(summary.presses[0].rule_key.is_some());
            assert!(summary.presses[1].rule_key.is_some());
        }
    }

    #[test]
    fn instances_are_reproducible_per_seed() {
        let tester = ModuleTester::new(false);
        let one = tester.run_instance(99, 4, 3).expect("instance");
        let two = tester.run_instance(99, 4, 3).expect("instance");
        assert_eq!(one, two);
    }

    #[test]
    fn noise_presses_are_counted_as_strikes_when_wrong() {
        let tester = ModuleTester::new(false);
        let summary = tester.run_instance(7, 4, 6).expect("instance");
        assert!(summary.solved, "noise must not make the module unsolvable");
        let incorrect = summary
            .presses
            .iter()
            .filter(|press| press.outcome == PressOutcome::Incorrect)
            .count();
        assert_eq!(summary.strikes, incorrect);
        let ledger_strikes = summary
            .logs
            .iter()
            .filter(|log| *log == "log.press.strike")
            .count();
        assert_eq!(summary.strikes, ledger_strikes);
    }

    #[test]
    fn bad_button_count_surfaces_an_error() {
        let tester = ModuleTester::new(false);
        assert!(tester.run_instance(1, 0, 0).is_err());
        assert!(tester.run_instance(1, 6, 0).is_err());
    }

    #[test]
    fn recorded_variant_matches_the_generated_serial() {
        let tester = ModuleTester::new(false);
        for seed in 0..20 {
            let summary = tester.run_instance(seed, 4, 0).expect("instance");
            assert_eq!(
                summary.variant,
                CascadeVariant::from_facts(&summary.edgework)
            );
        }
    }
}
