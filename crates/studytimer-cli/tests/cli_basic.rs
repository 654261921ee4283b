//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against an isolated data directory and
//! verify its JSON output.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_studytimer"))
        .args(args)
        .env("STUDYTIMER_DATA_DIR", data_dir)
        .env_remove("STUDYTIMER_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_first_run_seeds_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let timers = run_json(dir.path(), &["timer", "list"]);
    let timers = timers.as_array().unwrap();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0]["name"], "Standard Pomodoro");
    assert_eq!(timers[0]["work_duration"], 1500);

    let countdowns = run_json(dir.path(), &["countdown", "list"]);
    assert_eq!(countdowns.as_array().unwrap().len(), 1);
    assert!(dir.path().join("studytimer.db").exists());
    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_timer_status_starts_idle() {
    let dir = tempfile::tempdir().unwrap();
    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["type"], "state_snapshot");
    assert_eq!(status["state"], "idle");
    assert_eq!(status["phase"], "work");
}

#[test]
fn test_start_pause_resume_stop() {
    let dir = tempfile::tempdir().unwrap();

    let started = run_json(dir.path(), &["timer", "start"]);
    assert_eq!(started["type"], "timer_started");
    assert_eq!(started["duration_secs"], 1500);

    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["state"], "running");

    let paused = run_json(dir.path(), &["timer", "pause"]);
    assert_eq!(paused["type"], "timer_paused");

    // Pausing twice is a no-op that reports the current state.
    let again = run_json(dir.path(), &["timer", "pause"]);
    assert_eq!(again["state"], "paused");

    let resumed = run_json(dir.path(), &["timer", "resume"]);
    assert_eq!(resumed["type"], "timer_resumed");

    let stopped = run_json(dir.path(), &["timer", "stop"]);
    assert_eq!(stopped["type"], "timer_stopped");
    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["state"], "stopped");
}

#[test]
fn test_skip_moves_to_break() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["timer", "start"]);
    let skipped = run_json(dir.path(), &["timer", "skip"]);
    assert_eq!(skipped["type"], "phase_skipped");
    assert_eq!(skipped["from"], "work");
    assert_eq!(skipped["to"], "break");

    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["phase"], "break");
    assert_eq!(status["completed_sessions"], 1);
}

#[test]
fn test_add_select_and_remove_timer() {
    let dir = tempfile::tempdir().unwrap();
    let added = run_json(
        dir.path(),
        &["timer", "add", "Deep work", "--work", "50", "--break", "10", "--sessions", "2"],
    );
    assert_eq!(added["work_duration"], 3000);
    assert_eq!(added["break_duration"], 600);
    assert_eq!(added["long_break_duration"], 900);
    let id = added["id"].as_str().unwrap().to_string();

    let selected = run_json(dir.path(), &["timer", "select", &id]);
    assert_eq!(selected["type"], "timer_selected");
    assert_eq!(selected["timer_id"], id.as_str());

    run_json(dir.path(), &["timer", "remove", &id]);
    let status = run_json(dir.path(), &["timer", "status"]);
    assert!(status["selected_timer_id"].is_null());

    let (_, stderr, code) = run_cli(dir.path(), &["timer", "start"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_invalid_timer_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["timer", "add", "Broken", "--work", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_countdown_add_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    let added = run_json(
        dir.path(),
        &["countdown", "add", "Finals", "2099-06-17T10:00:00+03:00", "--color", "#10b981"],
    );
    assert_eq!(added["name"], "Finals");
    assert_eq!(added["target_date"], "2099-06-17T07:00:00Z");
    let id = added["id"].as_str().unwrap().to_string();

    let list = run_json(dir.path(), &["countdown", "list"]);
    let finals = list
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == id.as_str())
        .unwrap();
    assert_eq!(finals["expired"], false);

    let edited = run_json(
        dir.path(),
        &["countdown", "edit", &id, "--name", "Finals (resit)", "--target", "2099-09-01T09:00:00Z"],
    );
    assert_eq!(edited["id"], id.as_str());
    assert_eq!(edited["name"], "Finals (resit)");
    assert_eq!(edited["target_date"], "2099-09-01T09:00:00Z");
    assert_eq!(edited["color"], "#10b981");

    let (_, _, code) = run_cli(dir.path(), &["countdown", "edit", &id, "--target", "soon"]);
    assert_eq!(code, 1);

    run_json(dir.path(), &["countdown", "remove", &id]);
    let list = run_json(dir.path(), &["countdown", "list"]);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, _, code) = run_cli(dir.path(), &["countdown", "add", "Bad", "next week"]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "pomodoro.work_duration_min"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "25");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "pomodoro.work_duration_min", "45"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "pomodoro.work_duration_min"]);
    assert_eq!(stdout.trim(), "45");

    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "nope.nothing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));

    let (_, _, code) = run_cli(dir.path(), &["config", "reset"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "pomodoro.work_duration_min"]);
    assert_eq!(stdout.trim(), "25");
}

#[test]
fn test_oneshot_commands_refuse_while_run_is_active() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["timer", "start"]);

    let mut child = Command::new(env!("CARGO_BIN_EXE_studytimer"))
        .arg("run")
        .env("STUDYTIMER_DATA_DIR", dir.path())
        .env_remove("STUDYTIMER_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn run");

    let lease = dir.path().join("run.lock");
    let deadline = Instant::now() + Duration::from_secs(10);
    while !lease.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    // Give the holder a moment to write its record.
    std::thread::sleep(Duration::from_millis(200));
    if !lease.exists() {
        let _ = child.kill();
        panic!("run never took the lease");
    }

    let pause = run_cli(dir.path(), &["timer", "pause"]);
    let list = run_cli(dir.path(), &["countdown", "list"]);
    let second_run = run_cli(dir.path(), &["run"]);

    let _ = child.kill();
    let _ = child.wait();

    let (_, stderr, code) = pause;
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
    assert!(stderr.contains("studytimer run"));
    assert_eq!(list.2, 1);
    assert_eq!(second_run.2, 1);
}
