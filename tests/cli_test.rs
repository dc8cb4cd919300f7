//! CLI surface tests: verifies argument parsing without starting the daemon.
use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_both_subcommands() {
    let mut cmd = Command::cargo_bin("dbgd").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("send"));
}

#[test]
fn version_prints_crate_name() {
    let mut cmd = Command::cargo_bin("dbgd").unwrap();
    cmd.arg("--version").assert().success().stdout(predicate::str::contains("dbgd"));
}

#[test]
fn serve_help_lists_verbose_and_log_level() {
    let mut cmd = Command::cargo_bin("dbgd").unwrap();
    cmd.arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--log-level"));
}

#[test]
fn no_subcommand_fails() {
    let mut cmd = Command::cargo_bin("dbgd").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains("Usage:"));
}

#[test]
fn send_without_a_running_daemon_fails() {
    let socket = std::env::temp_dir().join("dbgd-cli-test-nonexistent.sock");
    let _ = std::fs::remove_file(&socket);

    let mut cmd = Command::cargo_bin("dbgd").unwrap();
    cmd.env("DBG_SOCKET_PATH", &socket)
        .arg("send")
        .arg("status")
        .assert()
        .failure();
}
