//! CLI integration tests.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;

fn stackwarden() -> Command {
    cargo_bin_cmd!("stackwarden")
}

fn broken_config() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("config.toml"), "[runtime\nport = ").expect("write config");
    dir
}

#[test]
fn test_help() {
    stackwarden()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackwarden"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_version() {
    stackwarden()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackwarden"));
}

#[test]
fn test_run_help_lists_flags() {
    stackwarden()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force-unlock"))
        .stdout(predicate::str::contains("--strict"));
}

#[test]
fn test_run_rejects_malformed_config() {
    let dir = broken_config();
    stackwarden()
        .args(["run", "--config"])
        .arg(dir.path().join("config.toml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_status_rejects_malformed_config() {
    let dir = broken_config();
    stackwarden()
        .args(["status", "--config"])
        .arg(dir.path().join("config.toml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_unknown_subcommand_fails() {
    stackwarden().arg("frobnicate").assert().failure();
}
