use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "commute-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_commute-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("assignment-uniformity"));
}

#[test]
fn cli_smoke_sweep_emits_a_json_report() {
    let exe = env!("CARGO_BIN_EXE_commute-tester");
    let output_path = temp_path("smoke");
    let output = Command::new(exe)
        .args([
            "--scenarios",
            "smoke",
            "--iterations",
            "2",
            "--seeds",
            "1337",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Commute Module Tester"));
    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(
        content
            .split("🏁")
            .next()
            .expect("report before the footer"),
    )
    .expect("parse json report");
    assert_eq!(report["results"][0]["scenario_name"], "Smoke Sweep");
    assert_eq!(report["results"][0]["passed"], true);
}

#[test]
fn cli_rejects_an_unknown_report_format() {
    let exe = env!("CARGO_BIN_EXE_commute-tester");
    let output = Command::new(exe)
        .args(["--report", "yaml"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--report"));
}
