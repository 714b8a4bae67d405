mod module_tester;
mod reports;
mod scenarios;
mod seeds;
mod streams;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use scenarios::{ALL_SCENARIO_KEYS, SweepRunner, get_scenario, list_scenarios};
use seeds::{resolve_seed_inputs, split_csv};

#[derive(Debug, Parser)]
#[command(name = "commute-tester", version = "0.1.0")]
#[command(about = "Automated QA sweeps for the Commute module decision engine")]
struct Args {
    /// Scenarios to run (comma-separated, `all` expands the whole catalog)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 100)]
    iterations: usize,

    /// Run extended acceptance sweeps (forces ≥1000 iterations)
    #[arg(long)]
    acceptance: bool,

    /// Buttons on the simulated panel
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=5))]
    button_count: u8,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let iterations = compute_iterations(&args);
    let start_time = Instant::now();
    let scenario_names = expand_scenarios(&args.scenarios);
    let seed_tokens = split_csv(&args.seeds);
    let seeds = resolve_seed_inputs(&seed_tokens)?;

    let all_results = run_sweeps(&args, &scenario_names, &seeds, iterations);

    write_reports(&args, &all_results, start_time)?;

    if all_results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🚌 Commute Module Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn compute_iterations(args: &Args) -> usize {
    if args.acceptance {
        if args.iterations < 1000 {
            println!(
                "🔁 Acceptance mode enabled: increasing iterations from {} to 1000",
                args.iterations
            );
        } else {
            println!(
                "🔁 Acceptance mode enabled: using {} iterations",
                args.iterations
            );
        }
        args.iterations.max(1000)
    } else {
        args.iterations
    }
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenario_names = split_csv(scenarios_arg);
    if scenario_names.contains(&"all".to_string()) {
        scenario_names.retain(|s| s != "all");
        scenario_names.extend(ALL_SCENARIO_KEYS.iter().map(ToString::to_string));
    }
    scenario_names
}

fn run_sweeps(
    args: &Args,
    scenario_names: &[String],
    seeds: &[u64],
    iterations: usize,
) -> Vec<scenarios::ScenarioResult> {
    println!("{}", "🧠 Running Module Sweeps".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let runner = SweepRunner::new(args.verbose);
    let mut results: Vec<scenarios::ScenarioResult> = Vec::new();

    for scenario_name in scenario_names {
        if let Some(scenario) = get_scenario(scenario_name, usize::from(args.button_count)) {
            results.extend(runner.run_scenario(&scenario, seeds, iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

fn write_reports(
    args: &Args,
    results: &[scenarios::ScenarioResult],
    start_time: Instant,
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Commute Module Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                let duration = start_time.elapsed();
                reports::generate_console_report(&mut output_target, results, duration)?;
            }
        }
    }

    let duration = start_time.elapsed();
    writeln!(&mut output_target)?;
    writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioResult;
    use std::time::Duration;

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            acceptance: false,
            button_count: 4,
            report: "json".to_string(),
            verbose: false,
            output: None,
        }
    }

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Smoke Sweep".to_string(),
            passed,
            iterations_run: 3,
            successful_iterations: if passed { 3 } else { 2 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["failure".to_string()]
            },
            average_duration: Duration::from_millis(10),
            performance_data: vec![Duration::from_millis(10)],
        }
    }

    #[test]
    fn computes_iterations_for_acceptance() {
        let mut args = base_args();
        args.acceptance = true;
        args.iterations = 10;
        assert_eq!(compute_iterations(&args), 1000);
        args.iterations = 1500;
        assert_eq!(compute_iterations(&args), 1500);
    }

    #[test]
    fn compute_iterations_returns_default_when_disabled() {
        let args = base_args();
        assert_eq!(compute_iterations(&args), 1);
    }

    #[test]
    fn expands_all_scenarios_keyword() {
        let expanded = expand_scenarios("all");
        assert!(expanded.contains(&"smoke".to_string()));
        assert!(expanded.contains(&"fallback-census".to_string()));
        assert_eq!(expanded.len(), ALL_SCENARIO_KEYS.len());
    }

    #[test]
    fn expand_scenarios_without_all_preserves_order() {
        let expanded = expand_scenarios("smoke,manual-sweep");
        assert_eq!(
            expanded,
            vec!["smoke".to_string(), "manual-sweep".to_string()]
        );
    }

    #[test]
    fn run_sweeps_skips_unknown_scenarios() {
        let args = base_args();
        let results = run_sweeps(&args, &["does-not-exist".to_string()], &[42], 1);
        assert!(results.is_empty());
    }

    #[test]
    fn run_sweeps_collects_a_result_per_seed() {
        let args = base_args();
        let results = run_sweeps(&args, &["smoke".to_string()], &[42, 43], 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed));
    }

    #[test]
    fn write_reports_emits_json_output() {
        let temp = std::env::temp_dir().join("commute-test-report.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("[]"));
    }

    #[test]
    fn write_reports_emits_json_for_results() {
        let temp = std::env::temp_dir().join("commute-report-full.json");
        let args = Args {
            report: "json".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("scenario_name"));
        assert!(content.contains("generated_at"));
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let temp = std::env::temp_dir().join("commute-report.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("No scenarios executed"));
    }

    #[test]
    fn write_reports_emits_markdown_report() {
        let temp = std::env::temp_dir().join("commute-report-full.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("# Commute Module Test Results"));
        assert!(content.contains("Smoke Sweep"));
    }

    #[test]
    fn write_reports_emits_console_report() {
        let temp = std::env::temp_dir().join("commute-report.txt");
        let args = Args {
            report: "console".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Sweep Results Summary"));
        assert!(content.contains("Total time:"));
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let temp = std::env::temp_dir().join("commute-scenarios.txt");
        let args = Args {
            list_scenarios: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Available scenarios"));
        assert!(content.contains("fallback-census"));
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        let args = base_args();
        assert!(!maybe_list_scenarios(&args).unwrap());
    }

    #[test]
    fn output_target_stdout_writes() {
        let mut target = OutputTarget::new(None).unwrap();
        target.write_all(b"ok").unwrap();
        target.flush().unwrap();
    }
}
