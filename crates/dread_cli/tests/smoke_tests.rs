//! CLI smoke tests: verify basic binary behavior.

use std::process::Command;

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dread"));
    cmd.env_remove("DREAD_CONFIG").env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Usage"),
        "Expected usage info in --help output"
    );
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dread"), "Expected binary name in --version output");
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let output = cli_bin()
        .args(["--config", "/tmp/nonexistent_dread_config_12345.toml"])
        .args(["--minutes", "3", "--seed", "7"])
        .output()
        .expect("failed to run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let summary: serde_json::Value =
        serde_json::from_str(&stdout).expect("summary should be JSON");
    assert!(summary["statistics"]["total_recorded"].as_u64().is_some());
    assert_eq!(summary["state"]["disposed"], serde_json::Value::Bool(false));
}

#[test]
fn test_failing_handler_is_reported_not_fatal() {
    let output = cli_bin()
        .args(["--config", "/tmp/nonexistent_dread_config_12345.toml"])
        .args(["--minutes", "1", "--seed", "1", "--fail-handler", "audio"])
        .output()
        .expect("failed to run");
    assert!(output.status.success());

    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("summary should be JSON");
    assert_eq!(summary["metrics"]["init_failures"], 1);
}
