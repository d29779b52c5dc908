//! Opening, using and closing a real session through the fake client.

use std::time::{Duration, Instant};

use provisioner::{ProvisionError, Session, SessionFactory};
use rstest::rstest;

use super::FakeSsh;

#[rstest]
fn refused_authentication_reports_the_master_log() {
    let ssh = FakeSsh::refusing("vagrant@127.0.0.1: Permission denied (publickey).");

    let err = ssh
        .factory(Duration::from_secs(10))
        .open(&ssh.target())
        .expect_err("authentication should fail");

    let ProvisionError::Connection { host, message } = err else {
        panic!("expected connection error, got {err}");
    };
    assert_eq!(host, "default");
    assert!(
        message.contains("Permission denied (publickey)."),
        "message: {message}"
    );
    assert!(ssh.master_pid().is_some(), "master never started");
    assert!(!ssh.master_alive(), "master was not reaped");
}

#[rstest]
fn master_that_never_accepts_clients_times_out() {
    let ssh = FakeSsh::never_ready();
    let started = Instant::now();

    let err = ssh
        .factory(Duration::from_secs(1))
        .open(&ssh.target())
        .expect_err("master should not become ready");

    assert!(
        matches!(err, ProvisionError::Connection { ref message, .. } if message.contains("not ready after 1s")),
        "unexpected error: {err}"
    );
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(!ssh.master_alive(), "master was not killed");
}

#[rstest]
fn commands_run_through_an_open_session() {
    let ssh = FakeSsh::lingering();
    let mut session = ssh
        .factory(Duration::from_secs(10))
        .open(&ssh.target())
        .expect("session should open");

    let output = session.run("echo provisioned").expect("command runs");
    assert!(output.is_success());
    assert_eq!(output.stdout, "provisioned\n");

    let failed = session.run("exit 7").expect("command runs");
    assert_eq!(failed.exit_code, Some(7));

    session.close().expect("close");
}

#[rstest]
fn close_kills_a_master_that_ignores_exit() {
    let ssh = FakeSsh::lingering();
    let mut session = ssh
        .factory(Duration::from_secs(10))
        .open(&ssh.target())
        .expect("session should open");
    let started = Instant::now();

    session.close().expect("close");

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "closed after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(15), "closed after {elapsed:?}");
    assert!(ssh.master_pid().is_some(), "master never started");
    assert!(!ssh.master_alive(), "master was not reaped");
}

#[rstest]
fn dropping_a_session_reaps_the_master() {
    let ssh = FakeSsh::lingering();
    let session = ssh
        .factory(Duration::from_secs(10))
        .open(&ssh.target())
        .expect("session should open");

    drop(session);

    assert!(!ssh.master_alive(), "master was not reaped");
}
