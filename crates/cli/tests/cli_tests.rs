//! CLI integration tests

use std::process::{Command, Output};

fn mplane(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mplane"))
        .args(args)
        .env_remove("MPLANE_API_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = mplane(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("model control plane"), "Should show app name");
    assert!(stdout.contains("groups"), "Should show groups command");
    assert!(stdout.contains("pods"), "Should show pods command");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("MPLANE_API_URL"), "Should show env var");
    assert!(stdout.contains("--format"), "Should show format option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = mplane(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("mplane"), "Should show binary name");
}

#[test]
fn test_groups_help_lists_scaling_commands() {
    let output = mplane(&["groups", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for cmd in ["list", "create", "delete", "scale", "up", "down", "stop", "start"] {
        assert!(stdout.contains(cmd), "Should show {} command", cmd);
    }
}

#[test]
fn test_groups_create_help() {
    let output = mplane(&["groups", "create", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--image"));
    assert!(stdout.contains("--container-port"));
    assert!(stdout.contains("--target-port"));
}

#[test]
fn test_pods_list_help() {
    let output = mplane(&["pods", "list", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--deployment"));
}

#[test]
fn test_scale_requires_replicas() {
    let output = mplane(&["groups", "scale", "fraud-model"]);
    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("required") || stderr.contains("error"));
}

#[test]
fn test_predict_requires_features() {
    let output = mplane(&["predict", "10.0.0.7:80"]);
    assert!(!output.status.success());
}

#[test]
fn test_predict_rejects_non_numeric_features() {
    let output = mplane(&["predict", "10.0.0.7:80", "0.5", "abc"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid"), "Should report invalid value");
}

#[test]
fn test_invalid_format() {
    let output = mplane(&["--format", "yaml", "groups", "list"]);
    assert!(!output.status.success());
}

#[test]
fn test_config_show_prefers_flag() {
    let output = mplane(&["--api-url", "http://plane:9000/api/ControlPlane", "config", "show"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout.trim(), "http://plane:9000/api/ControlPlane");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = mplane(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error") || stderr.contains("invalid"));
}
