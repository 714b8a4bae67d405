//! Sweep scenario catalog and the runner that executes it.
//!
//! A scenario is a plan (panel width, noise presses, iteration floor) plus
//! expectations. Per-instance expectations judge each [`InstanceSummary`] on
//! its own; sweep expectations judge the whole batch, which is where the
//! statistical checks live.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use commute_core::{
    CascadeVariant, CommuteMethod, Edgework, METHOD_ORDER, PressOutcome, Stage, fallback_slot,
    stage1_verdict, stage2_verdict,
};

use crate::module_tester::{InstanceSummary, ModuleTester};

type Expectation = fn(&InstanceSummary) -> Result<()>;
type SweepExpectation = fn(&[InstanceSummary]) -> Result<()>;

/// Scenario keys expanded by the `all` keyword, in run order.
pub const ALL_SCENARIO_KEYS: [&str; 6] = [
    "smoke",
    "manual-sweep",
    "strike-recovery",
    "reverse-cascade",
    "fallback-census",
    "assignment-uniformity",
];

/// What one scenario asks of the instance driver.
#[derive(Clone)]
pub struct SweepPlan {
    pub button_count: usize,
    pub noise_presses: usize,
    /// Statistical scenarios raise the CLI iteration count to this floor.
    pub min_iterations: usize,
    pub expectations: Vec<Expectation>,
    pub sweep_expectations: Vec<SweepExpectation>,
}

impl SweepPlan {
    fn new(button_count: usize) -> Self {
        Self {
            button_count,
            noise_presses: 0,
            min_iterations: 0,
            expectations: Vec::new(),
            sweep_expectations: Vec::new(),
        }
    }

    fn with_noise(mut self, presses: usize) -> Self {
        self.noise_presses = presses;
        self
    }

    fn with_min_iterations(mut self, floor: usize) -> Self {
        self.min_iterations = floor;
        self
    }

    fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    fn with_sweep_expectation(mut self, expectation: SweepExpectation) -> Self {
        self.sweep_expectations.push(expectation);
        self
    }
}

#[derive(Clone)]
pub struct SweepScenario {
    name: &'static str,
    plan: SweepPlan,
}

impl SweepScenario {
    fn new(name: &'static str, plan: SweepPlan) -> Self {
        Self { name, plan }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn plan(&self) -> &SweepPlan {
        &self.plan
    }
}

/// Look up a scenario by CLI key.
#[must_use]
pub fn get_scenario(name: &str, button_count: usize) -> Option<SweepScenario> {
    match name.to_lowercase().as_str() {
        "smoke" => Some(smoke_scenario(button_count)),
        "manual-sweep" | "manual" => Some(manual_sweep_scenario(button_count)),
        "strike-recovery" | "strikes" => Some(strike_recovery_scenario(button_count)),
        "reverse-cascade" | "reverse" => Some(reverse_cascade_scenario(button_count)),
        "fallback-census" | "fallback" => Some(fallback_census_scenario(button_count)),
        "assignment-uniformity" | "uniformity" => {
            Some(assignment_uniformity_scenario(button_count))
        }
        _ => None,
    }
}

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Smoke Sweep"),
        ("manual-sweep", "Manual Follower Sweep"),
        ("strike-recovery", "Strike Recovery Sweep"),
        ("reverse-cascade", "Reverse Cascade Sweep"),
        ("fallback-census", "Fallback Census"),
        ("assignment-uniformity", "Assignment Uniformity Sweep"),
    ]
}

fn smoke_scenario(button_count: usize) -> SweepScenario {
    SweepScenario::new(
        "Smoke Sweep",
        SweepPlan::new(button_count)
            .with_expectation(solved_expectation)
            .with_expectation(ledger_coherence_expectation),
    )
}

fn manual_sweep_scenario(button_count: usize) -> SweepScenario {
    SweepScenario::new(
        "Manual Follower Sweep",
        SweepPlan::new(button_count)
            .with_expectation(solved_expectation)
            .with_expectation(perfect_run_expectation)
            .with_expectation(verdict_replay_expectation),
    )
}

fn strike_recovery_scenario(button_count: usize) -> SweepScenario {
    SweepScenario::new(
        "Strike Recovery Sweep",
        SweepPlan::new(button_count)
            .with_noise(6)
            .with_expectation(solved_expectation)
            .with_expectation(ledger_coherence_expectation)
            .with_expectation(recovery_expectation),
    )
}

fn reverse_cascade_scenario(button_count: usize) -> SweepScenario {
    SweepScenario::new(
        "Reverse Cascade Sweep",
        SweepPlan::new(button_count)
            .with_min_iterations(200)
            .with_expectation(solved_expectation)
            .with_expectation(verdict_replay_expectation)
            .with_sweep_expectation(both_variants_seen),
    )
}

fn fallback_census_scenario(button_count: usize) -> SweepScenario {
    SweepScenario::new(
        "Fallback Census",
        SweepPlan::new(button_count)
            .with_min_iterations(2000)
            .with_expectation(solved_expectation)
            .with_expectation(fallback_in_layout_expectation)
            .with_sweep_expectation(fallback_fires_somewhere),
    )
}

fn assignment_uniformity_scenario(button_count: usize) -> SweepScenario {
    SweepScenario::new(
        "Assignment Uniformity Sweep",
        SweepPlan::new(button_count)
            .with_min_iterations(600)
            .with_expectation(distinct_methods_expectation)
            .with_sweep_expectation(marginals_stay_level),
    )
}

fn solved_expectation(summary: &InstanceSummary) -> Result<()> {
    anyhow::ensure!(
        summary.solved,
        "module should end solved, stalled after {} presses",
        summary.presses.len()
    );
    Ok(())
}

fn ledger_coherence_expectation(summary: &InstanceSummary) -> Result<()> {
    anyhow::ensure!(
        summary.logs.first().map(String::as_str) == Some("log.module.armed"),
        "ledger should open with the armed key"
    );
    if summary.solved {
        anyhow::ensure!(
            summary.logs.last().map(String::as_str) == Some("log.module.solved"),
            "ledger should close with the solved key"
        );
    }
    let ledger_strikes = summary
        .logs
        .iter()
        .filter(|log| *log == "log.press.strike")
        .count();
    anyhow::ensure!(
        ledger_strikes == summary.strikes,
        "ledger counts {ledger_strikes} strikes, records count {}",
        summary.strikes
    );
    Ok(())
}

fn perfect_run_expectation(summary: &InstanceSummary) -> Result<()> {
    anyhow::ensure!(
        summary.strikes == 0,
        "a manual follower should never strike, saw {}",
        summary.strikes
    );
    anyhow::ensure!(
        summary.presses.len() == 2,
        "a manual follower should clear both stages in two presses, took {}",
        summary.presses.len()
    );
    Ok(())
}

/// Replay every recorded press against rebuilt facts and check the engine
/// consulted the rule the cascades demand.
fn verdict_replay_expectation(summary: &InstanceSummary) -> Result<()> {
    let mut stage1_answer: Option<usize> = None;
    for press in &summary.presses {
        if let Some(recorded) = press.rule_key.as_deref() {
            let facts = facts_at(&summary.edgework, press.remaining_seconds);
            let replayed = match press.stage {
                Stage::Stage1 => Some(stage1_verdict(&summary.assignment, &facts).rule.key()),
                Stage::Stage2 => stage1_answer
                    .map(|answer| stage2_verdict(&summary.assignment, &facts, answer).rule.key()),
                Stage::Unarmed | Stage::Solved => None,
            };
            if let Some(expected) = replayed {
                anyhow::ensure!(
                    recorded == expected,
                    "press on slot {} recorded rule {recorded} but replays to {expected}",
                    press.slot
                );
            }
        }
        if press.stage == Stage::Stage1 && press.outcome == PressOutcome::Correct {
            stage1_answer = Some(press.slot);
        }
    }
    Ok(())
}

fn recovery_expectation(summary: &InstanceSummary) -> Result<()> {
    let incorrect = summary
        .presses
        .iter()
        .filter(|press| press.outcome == PressOutcome::Incorrect)
        .count();
    anyhow::ensure!(
        summary.strikes == incorrect,
        "strike count {} disagrees with {incorrect} incorrect presses",
        summary.strikes
    );
    anyhow::ensure!(
        summary.presses.last().map(|press| press.outcome) == Some(PressOutcome::Solved),
        "the final press should be the solving one"
    );
    Ok(())
}

fn fallback_in_layout_expectation(summary: &InstanceSummary) -> Result<()> {
    for press in &summary.presses {
        if press.rule_key.as_deref() != Some("fallback") {
            continue;
        }
        let facts = facts_at(&summary.edgework, press.remaining_seconds);
        let expected = fallback_slot(&facts);
        anyhow::ensure!(
            expected <= 3,
            "fallback slot {expected} escaped the four-wide layout"
        );
        anyhow::ensure!(
            press.slot == expected,
            "fallback pointed at slot {expected} but slot {} was pressed",
            press.slot
        );
    }
    Ok(())
}

fn distinct_methods_expectation(summary: &InstanceSummary) -> Result<()> {
    let mut seen: Vec<CommuteMethod> = Vec::new();
    for (slot, method) in summary.assignment.iter() {
        anyhow::ensure!(
            !seen.contains(&method),
            "slot {slot} repeats {}",
            method.as_str()
        );
        seen.push(method);
    }
    Ok(())
}

fn both_variants_seen(summaries: &[InstanceSummary]) -> Result<()> {
    let reverse = summaries
        .iter()
        .filter(|summary| summary.variant == CascadeVariant::Reverse)
        .count();
    anyhow::ensure!(reverse > 0, "sweep never met the reverse cascade");
    anyhow::ensure!(
        reverse < summaries.len(),
        "sweep never met the normal cascade"
    );
    Ok(())
}

fn fallback_fires_somewhere(summaries: &[InstanceSummary]) -> Result<()> {
    let hits = summaries
        .iter()
        .flat_map(|summary| summary.presses.iter())
        .filter(|press| press.rule_key.as_deref() == Some("fallback"))
        .count();
    anyhow::ensure!(
        hits > 0,
        "no instance ever fell through to the fallback rule"
    );
    Ok(())
}

fn marginals_stay_level(summaries: &[InstanceSummary]) -> Result<()> {
    anyhow::ensure!(!summaries.is_empty(), "sweep produced no instances");
    let mut tallies: HashMap<(usize, CommuteMethod), usize> = HashMap::new();
    for summary in summaries {
        for (slot, method) in summary.assignment.iter() {
            *tallies.entry((slot, method)).or_insert(0) += 1;
        }
    }

    let width = summaries[0].assignment.slot_count();
    anyhow::ensure!(
        tallies.len() == width * METHOD_ORDER.len(),
        "some method never appeared at some slot"
    );

    let total = summaries.len();
    let lower = total / 10;
    let upper = 3 * total / 10;
    for ((slot, method), count) in &tallies {
        anyhow::ensure!(
            (lower..=upper).contains(count),
            "slot {slot} drew {} {count} times across {total} instances",
            method.as_str()
        );
    }
    Ok(())
}

fn facts_at(edgework: &Edgework, remaining_seconds: f32) -> Edgework {
    Edgework {
        timer_seconds: remaining_seconds,
        ..edgework.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

/// Runs scenarios seed by seed and folds the outcomes into results.
pub struct SweepRunner {
    tester: ModuleTester,
    verbose: bool,
}

impl SweepRunner {
    #[must_use]
    pub const fn new(verbose: bool) -> Self {
        Self {
            tester: ModuleTester::new(verbose),
            verbose,
        }
    }

    pub fn run_scenario(
        &self,
        scenario: &SweepScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {seed})",
                    scenario.name().bright_white()
                );
            }
            results.push(self.run_single(scenario, seed, iterations));
        }

        results
    }

    fn run_single(&self, scenario: &SweepScenario, seed: u64, iterations: usize) -> ScenarioResult {
        let plan = scenario.plan();
        let iterations = iterations.max(plan.min_iterations);

        let mut successes = 0;
        let mut failures: Vec<String> = Vec::new();
        let mut performance_data: Vec<Duration> = Vec::new();
        let mut summaries: Vec<InstanceSummary> = Vec::with_capacity(iterations);

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            match self
                .tester
                .run_instance(iteration_seed, plan.button_count, plan.noise_presses)
            {
                Ok(summary) => {
                    if let Some(err) = evaluate_expectations(plan, &summary) {
                        failures.push(describe_failure(i, &summary, &err));
                        if self.verbose {
                            println!("  ❌ Iteration {}/{iterations} failed: {}", i + 1, err.red());
                        }
                    } else {
                        successes += 1;
                        let duration = start_time.elapsed();
                        performance_data.push(duration);
                        if self.verbose {
                            println!(
                                "  ✅ Iteration {}/{iterations} passed ({duration:?}) presses:{} strikes:{}",
                                i + 1,
                                summary.presses.len(),
                                summary.strikes
                            );
                        }
                    }
                    summaries.push(summary);
                }
                Err(err) => {
                    failures.push(format!("Iteration {} (seed {iteration_seed}): {err:#}", i + 1));
                }
            }
        }

        for expectation in &plan.sweep_expectations {
            if let Err(err) = expectation(&summaries) {
                failures.push(format!("Sweep check failed: {err:#}"));
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name().to_string(),
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }
}

fn evaluate_expectations(plan: &SweepPlan, summary: &InstanceSummary) -> Option<String> {
    for expectation in &plan.expectations {
        if let Err(err) = expectation(summary) {
            return Some(err.to_string());
        }
    }
    None
}

fn describe_failure(index: usize, summary: &InstanceSummary, err: &str) -> String {
    let recent_logs = summary
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .join(" | ");
    format!(
        "Iteration {} (seed {}, variant {:?}, presses {}, strikes {}): {err} | recent logs: {recent_logs}",
        index + 1,
        summary.seed,
        summary.variant,
        summary.presses.len(),
        summary.strikes
    )
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations
            .iter()
            .map(std::time::Duration::as_millis)
            .collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}
