//! End-to-end tests for the `pulse` binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ==================== Helper Functions ====================

const NOW: &str = "2024-06-01T12:00:00Z";

const SCRIPT: &str = r#"{
    "widgets": [
        {"id": "metric-options", "kind": "options", "dimension": "metric_name"},
        {"id": "service-options", "kind": "options", "dimension": "service"},
        {"id": "by-service", "kind": "aggregated", "group_by": "service"}
    ],
    "events": [
        {"type": "set_filter", "dimension": "service", "value": "billing-api"},
        {"type": "set_filter", "dimension": "region", "value": "us-east-1"},
        {"type": "apply_preset", "preset": "last_6h"}
    ]
}"#;

const FIXTURES: &str = r#"{
    "options": {
        "default": {
            "services": ["checkout-api", "search-api"],
            "metrics": ["latency", "error_rate"]
        }
    },
    "aggregated": {
        "data": [{"dimension": "checkout-api", "value": 120.5, "count": 42}],
        "group_by": "service",
        "metric": "latency",
        "aggregation": "avg"
    }
}"#;

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn pulse() -> Command {
    let mut cmd = Command::cargo_bin("pulse").unwrap();
    cmd.env_remove("PULSE_CONFIG");
    cmd
}

fn replay_json(script: &Path, fixtures: Option<&Path>) -> serde_json::Value {
    let mut cmd = pulse();
    cmd.args(["--format", "json", "replay"])
        .arg(script)
        .args(["--now", NOW]);
    if let Some(fixtures) = fixtures {
        cmd.arg("--fixtures").arg(fixtures);
    }
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

// ==================== Replay Tests ====================

#[test]
fn test_replay_without_fixtures_keeps_values() {
    let dir = TempDir::new().unwrap();
    let script = write_file(&dir, "script.json", SCRIPT);

    let json = replay_json(&script, None);

    assert_eq!(json["steps"].as_array().unwrap().len(), 3);
    assert_eq!(json["state"]["revision"], 3);
    assert_eq!(json["state"]["preset"], "last_6h");
    assert_eq!(json["state"]["filters"][0]["value"], "billing-api");
    assert!(json["state"]["filters"][0]["shown"].is_null());
    assert!(json["initial_refresh"].is_null());
}

#[test]
fn test_replay_with_fixtures_reconciles_filters() {
    let dir = TempDir::new().unwrap();
    let script = write_file(&dir, "script.json", SCRIPT);
    let fixtures = write_file(&dir, "fixtures.json", FIXTURES);

    let json = replay_json(&script, Some(&fixtures));

    assert_eq!(json["initial_refresh"]["reconciled"], 1);
    assert_eq!(json["state"]["filters"][0]["dimension"], "service");
    assert!(json["state"]["filters"][0]["value"].is_null());
    assert_eq!(json["state"]["filters"][2]["value"], "us-east-1");
    assert_eq!(json["state"]["filters"][4]["dimension"], "metric_name");
    assert_eq!(json["state"]["filters"][4]["value"], "latency");

    let widgets = json["state"]["widgets"].as_array().unwrap();
    assert_eq!(widgets.len(), 3);
    assert!(widgets.iter().all(|w| w["status"] == "ready"));
}

#[test]
fn test_replay_table_output() {
    let dir = TempDir::new().unwrap();
    let script = write_file(&dir, "script.json", SCRIPT);

    pulse()
        .arg("replay")
        .arg(&script)
        .args(["--now", NOW])
        .assert()
        .success()
        .stdout(predicate::str::contains("set_filter"))
        .stdout(predicate::str::contains("Query Context (revision 3)"))
        .stdout(predicate::str::contains("aggregated(service, avg)"));
}

#[test]
fn test_replay_strict_fails_on_rejection() {
    let dir = TempDir::new().unwrap();
    let script = write_file(
        &dir,
        "script.json",
        r#"{"events": [{"type": "drill_up", "level": 1}]}"#,
    );

    pulse()
        .arg("replay")
        .arg(&script)
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "step 1 (drill_up) rejected: cannot drill up to level 1",
        ));
}

#[test]
fn test_replay_invalid_script() {
    let dir = TempDir::new().unwrap();
    let script = write_file(&dir, "script.json", r#"{"events": [{"type": "teleport"}]}"#);

    pulse()
        .arg("replay")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid script file"));
}

// ==================== Presets and Config Tests ====================

#[test]
fn test_presets_table() {
    pulse()
        .args(["presets", "--now", NOW])
        .assert()
        .success()
        .stdout(predicate::str::contains("last_15m"))
        .stdout(predicate::str::contains("last_24h*"))
        .stdout(predicate::str::contains("2024-06-01T11:45:00+00:00"));
}

#[test]
fn test_config_file_is_applied() {
    let dir = TempDir::new().unwrap();
    let config = write_file(
        &dir,
        "pulse.json",
        r#"{"default_preset": "last_1h", "brush_policy": "apply_on_commit"}"#,
    );

    let output = pulse()
        .args(["--format", "json", "--config"])
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();

    assert_eq!(json["default_preset"], "last_1h");
    assert_eq!(json["brush_policy"], "apply_on_commit");
    assert_eq!(json["max_refresh_rounds"], 4);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_file(&dir, "pulse.json", r#"{"max_refresh_rounds": 0}"#);

    pulse()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading configuration from"))
        .stderr(predicate::str::contains("max_refresh_rounds must be at least 1"));
}
