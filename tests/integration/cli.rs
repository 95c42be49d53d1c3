use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

#[test]
fn help_describes_the_supervisor() {
    Command::new(assert_cmd::cargo::cargo_bin!("shedguard"))
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--settings"))
        .stdout(contains("--secret-stdin"));
}

#[test]
fn rejects_invalid_log_level() {
    Command::new(assert_cmd::cargo::cargo_bin!("shedguard"))
        .args(["--log-level", "loud"])
        .assert()
        .failure()
        .stderr(contains("invalid log level"));
}

#[test]
fn missing_settings_file_is_fatal() {
    let temp = tempdir().expect("failed to create tempdir");
    let missing = temp.path().join("absent.yaml");

    Command::new(assert_cmd::cargo::cargo_bin!("shedguard"))
        .arg("--settings")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(contains("Failed to read settings file"));
}

#[test]
fn unknown_settings_are_rejected() {
    let temp = tempdir().expect("failed to create tempdir");
    let path = temp.path().join("shedguard.yaml");
    fs::write(&path, "restart_every: 5s\n").expect("failed to write settings");

    Command::new(assert_cmd::cargo::cargo_bin!("shedguard"))
        .arg("--settings")
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("Invalid YAML format"));
}
