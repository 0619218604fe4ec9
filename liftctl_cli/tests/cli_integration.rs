use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Tight timers so a simulated session finishes in a few seconds.
fn write_fast_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[auto_start]
countdown_secs = 1

[auto_stop]
startup_grace_ms = 300
stall_duration_ms = 600
release_duration_ms = 400

[session]
rest_secs = 1
command_gap_ms = 1

[feed]
read_timeout_ms = 50
stale_after_ms = 2000
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn write_routine(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let toml = r#"
name = "quick push"

[[exercise]]
name = "bench press"
reps = [2, 2]
weights_kg = [10.0, 10.0]
default_reps = 2
default_weight_kg = 10.0
"#;
    let path = dir.path().join(name);
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["check"], 0, "ok", "stdout")]
#[case(&["run"], 2, "required", "stderr")]
#[case(&["routines", "remove", "nope"], -1, "removing routine", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);
    let routines = dir.path().join("routines");

    let mut cmd = Command::cargo_bin("liftctl_cli").unwrap();
    cmd.arg("--config").arg(&cfg);
    cmd.arg("--routines").arg(&routines);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert();
    let assert = if exit_code >= 0 {
        assert.code(exit_code)
    } else {
        assert.failure()
    };

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn run_completes_a_short_routine() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);
    let routine = write_routine(&dir, "push.toml");

    let mut cmd = Command::cargo_bin("liftctl_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--routine")
        .arg(&routine)
        .arg("--rep-ms")
        .arg("400")
        .arg("--print-sets");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("session complete"))
        .stdout(predicate::str::contains("bench press"));
}

#[rstest]
fn run_reports_broken_routine_toml() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);
    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "name = \"x\"\n[[exercise]]\nname = 7\n").unwrap();

    let mut cmd = Command::cargo_bin("liftctl_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--routine")
        .arg(&bad);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("TOML"));
}

#[rstest]
fn routines_add_then_list_round_trips() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);
    let routines = dir.path().join("routines");
    let file = write_routine(&dir, "push.toml");

    Command::cargo_bin("liftctl_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--routines")
        .arg(&routines)
        .arg("routines")
        .arg("add")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("added 'quick push'"));

    Command::cargo_bin("liftctl_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--routines")
        .arg(&routines)
        .arg("routines")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("quick push"))
        .stdout(predicate::str::contains("2 sets"));
}

#[rstest]
fn check_fails_on_invalid_config() {
    let dir = tempdir().unwrap();
    let bad_cfg = dir.path().join("cfg.toml");
    // stall_high must exceed stall_low
    fs::write(&bad_cfg, "[auto_stop]\nstall_low = 5.0\nstall_high = 1.0\n").unwrap();

    let mut cmd = Command::cargo_bin("liftctl_cli").unwrap();
    cmd.arg("--config").arg(&bad_cfg).arg("check");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("stall_high"));
}
