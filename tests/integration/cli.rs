//! End-to-end runs of the `fiberpool` binary.

use std::process::Command;

fn fiberpool() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fiberpool"));
    for key in ["FIBERPOOL_WORKERS", "FIBERPOOL_IDLE_TIMEOUT_MS", "FIBERPOOL_DRAIN"] {
        cmd.env_remove(key);
    }
    cmd
}

fn empty_config() -> tempfile::NamedTempFile {
    tempfile::NamedTempFile::new().unwrap()
}

#[test]
fn test_cli_run_reports_priority_order() {
    let config = empty_config();
    let output = fiberpool()
        .arg("--config")
        .arg(config.path())
        .args(["run", "--tasks", "3", "--workers", "1", "--priorities", "low,high,low", "--json"])
        .output()
        .expect("Failed to run fiberpool");

    assert!(
        output.status.success(),
        "STDERR: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["order"], serde_json::json!([1, 0, 2]));
    assert_eq!(report["stats"]["tasks_executed"], 3);
    assert_eq!(report["outcomes"][0]["kind"], "completed");
}

#[test]
fn test_cli_stack_sizes() {
    let config = empty_config();
    let output = fiberpool()
        .arg("--config")
        .arg(config.path())
        .arg("stack-sizes")
        .output()
        .expect("Failed to run fiberpool");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|l| l.starts_with("huge") && l.ends_with("33554432")));
    assert_eq!(stdout.lines().count(), 5);
}

#[test]
fn test_cli_rejects_bad_config() {
    let config = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(config.path(), "num_workers = 0\n").unwrap();
    let output = fiberpool()
        .arg("--config")
        .arg(config.path())
        .arg("config")
        .output()
        .expect("Failed to run fiberpool");

    assert!(!output.status.success());
}

#[test]
fn test_cli_log_level_option() {
    let config = empty_config();
    let ok = fiberpool()
        .arg("--config")
        .arg(config.path())
        .args(["--log-level", "warn", "config"])
        .output()
        .expect("Failed to run fiberpool");
    assert!(ok.status.success());

    let bad = fiberpool()
        .args(["--log-level", "loud", "config"])
        .output()
        .expect("Failed to run fiberpool");
    assert!(!bad.status.success());
}
