//! The --json surface is consumed by the companion app; its shape is a
//! contract, so parse it rather than grepping for substrings.

use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn json_run_emits_set_lines_and_a_session_footer() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        r#"
[auto_start]
countdown_secs = 1

[auto_stop]
startup_grace_ms = 300
stall_duration_ms = 600
release_duration_ms = 400

[session]
rest_secs = 1
command_gap_ms = 1
"#,
    )
    .unwrap();
    let routine = dir.path().join("push.toml");
    fs::write(
        &routine,
        r#"
name = "quick push"

[[exercise]]
name = "bench press"
reps = [2]
weights_kg = [10.0]
"#,
    )
    .unwrap();

    let output = Command::cargo_bin("liftctl_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("run")
        .arg("--routine")
        .arg(&routine)
        .arg("--rep-ms")
        .arg("400")
        .output()
        .unwrap();
    assert!(output.status.success(), "run failed: {output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<Value> = stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("stdout line is JSON"))
        .collect();
    assert!(!lines.is_empty());

    let sets: Vec<&Value> = lines.iter().filter(|v| v["event"] == "set").collect();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0]["exercise"], "bench press");
    assert_eq!(sets[0]["working_reps"], 2);
    assert_eq!(sets[0]["weight_per_cable_kg"], 10.0);
    assert!(sets[0]["duration_ms"].as_u64().is_some());

    let footer = lines.last().unwrap();
    assert_eq!(footer["event"], "session");
    assert_eq!(footer["sets"], 1);
    assert!(footer["state"].as_str().is_some());
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let output = Command::cargo_bin("liftctl_cli")
        .unwrap()
        .arg("--routines")
        .arg(dir.path())
        .arg("--json")
        .arg("run")
        .arg("--routine")
        .arg(missing.to_str().unwrap())
        .output()
        .unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    let err_line = stderr
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .expect("structured error on stderr");
    let v: Value = serde_json::from_str(err_line).unwrap();
    assert!(v["reason"].as_str().is_some());
    assert!(v["message"].as_str().is_some());
}
