//! BDD scenarios for provisioning a host.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ProvisionContext, provision_context};

#[scenario(
    path = "tests/features/provision.feature",
    name = "Run a seven step build plan in order"
)]
fn scenario_seven_steps_in_order(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Stop at the first failing step"
)]
fn scenario_stop_at_first_failure(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Refuse an ambiguous build directory"
)]
fn scenario_ambiguous_directory(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Refuse a missing build directory"
)]
fn scenario_missing_directory(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Report a sudo password prompt"
)]
fn scenario_sudo_password_prompt(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Report an unreachable host"
)]
fn scenario_unreachable_host(provision_context: ProvisionContext) {
    let _ = provision_context;
}

#[scenario(
    path = "tests/features/provision.feature",
    name = "Provision FreeBSD through sh"
)]
fn scenario_freebsd_profile(provision_context: ProvisionContext) {
    let _ = provision_context;
}
