//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn list_prints_every_profile() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.arg("list");

    cmd.assert()
        .success()
        .stdout(contains("freebsd10"))
        .stdout(contains("ubuntu14"))
        .stdout(contains("ubuntu16"));
}

#[test]
fn show_renders_privileged_steps_with_sudo() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.args(["show", "freebsd10"]);

    cmd.assert()
        .success()
        .stdout(contains(" 1. sudo -n -H /bin/sh -c 'pkg install -q -y git'"))
        .stdout(contains(">> .cshrc"));
}

#[test]
fn show_json_includes_plan_and_commands() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.args(["show", "ubuntu16", "--json"]);

    cmd.assert()
        .success()
        .stdout(contains("\"name\": \"ubuntu16:all\""))
        .stdout(contains("\"kind\": \"glob\""))
        .stdout(contains("\"mode\": \"privileged\""));
}

#[test]
fn unknown_profile_is_rejected() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.args(["show", "debian9"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("unknown profile \"debian9\""));
}

#[test]
fn unknown_task_is_rejected() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.args(["show", "ubuntu14", "--task", "deploy"]);

    cmd.assert()
        .failure()
        .stderr(contains("has no task \"deploy\""));
}
