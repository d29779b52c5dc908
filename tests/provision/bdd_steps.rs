//! BDD step definitions for provisioning a host.

use provisioner::render::DEFAULT_ESCALATION;
use provisioner::{DEFAULT_TASK, ExecutionMode, Executor, ExecutorSettings, Profile, ProvisionError};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{ProvisionContext, imagemagick_plan};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Plan(#[from] provisioner::PlanError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a reachable host")]
fn reachable_host(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context
}

#[given("a host that refuses connections")]
fn unreachable_host(provision_context: ProvisionContext) -> ProvisionContext {
    provision_context
        .factory
        .fail_connect("ssh: connect to host 127.0.0.1 port 2222: Connection refused");
    provision_context
}

#[given("the ImageMagick build plan")]
fn build_plan(mut provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    provision_context.plan = Some(imagemagick_plan()?);
    Ok(provision_context)
}

#[given("the \"{name}\" profile")]
fn profile_plan(
    mut provision_context: ProvisionContext,
    name: String,
) -> Result<ProvisionContext, StepError> {
    let profile: Profile = name.parse()?;
    provision_context.plan = Some(profile.plan(DEFAULT_TASK)?);
    provision_context.target = provision_context.target.with_shell(profile.shell());
    Ok(provision_context)
}

#[given("the remote home holds directories \"{names}\"")]
fn remote_directories(provision_context: ProvisionContext, names: String) -> ProvisionContext {
    let dirs: Vec<&str> = names.split(',').map(str::trim).collect();
    provision_context.factory.set_directories(".", &dirs);
    provision_context
}

#[given("step \"{index}\" exits with status \"{code}\"")]
fn step_exits(provision_context: ProvisionContext, index: usize, code: i32) -> ProvisionContext {
    for _ in 1..index {
        provision_context.factory.push_success();
    }
    provision_context.factory.push_exit_code(code);
    provision_context
}

#[given("sudo asks for a password at step \"{index}\"")]
fn sudo_prompts(provision_context: ProvisionContext, index: usize) -> ProvisionContext {
    for _ in 1..index {
        provision_context.factory.push_success();
    }
    provision_context
        .factory
        .push_output(Some(1), "", "sudo: a password is required\n");
    provision_context
}

#[when("I execute the plan")]
fn execute_plan(mut provision_context: ProvisionContext) -> Result<ProvisionContext, StepError> {
    let plan = provision_context
        .plan
        .clone()
        .ok_or_else(|| StepError::Assertion(String::from("no plan was chosen")))?;
    let mut executor = Executor::new(
        provision_context.factory.clone(),
        ExecutorSettings::default(),
    );
    provision_context.outcome = Some(executor.execute(&provision_context.target, &plan));
    Ok(provision_context)
}

#[then("the plan succeeds")]
fn plan_succeeds(provision_context: &ProvisionContext) -> Result<(), StepError> {
    match provision_context.outcome {
        Some(Ok(_)) => Ok(()),
        Some(Err(ref err)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {err}"
        ))),
        None => Err(StepError::Assertion(String::from("plan was not executed"))),
    }
}

#[then("the plan fails at step \"{index}\" with \"{kind}\"")]
fn plan_fails_at(
    provision_context: &ProvisionContext,
    index: usize,
    kind: String,
) -> Result<(), StepError> {
    let err = failure(provision_context)?;
    if err.step_index() != Some(index) {
        return Err(StepError::Assertion(format!(
            "expected failure at step {index}, got: {err}"
        )));
    }
    let matches = match kind.as_str() {
        "command failed" => matches!(err, ProvisionError::CommandFailed { .. }),
        "ambiguous path" => matches!(err, ProvisionError::AmbiguousPath { .. }),
        "privilege escalation" => matches!(err, ProvisionError::PrivilegeEscalationFailed { .. }),
        "connection lost" => matches!(err, ProvisionError::ConnectionLost { .. }),
        other => {
            return Err(StepError::Assertion(format!("unknown failure kind {other}")));
        }
    };
    if matches {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {kind}, got: {err}")))
    }
}

#[then("the plan fails before any step")]
fn plan_fails_before_steps(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let err = failure(provision_context)?;
    if err.is_connection() && err.step_index().is_none() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected connection failure, got: {err}"
        )))
    }
}

#[then("\"{count}\" commands were sent")]
fn commands_sent(provision_context: &ProvisionContext, count: usize) -> Result<(), StepError> {
    let sent = provision_context.factory.invocations().len();
    if sent == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} commands, got {sent}"
        )))
    }
}

#[then("step \"{index}\" ran in \"{dir}\"")]
fn step_ran_in(
    provision_context: &ProvisionContext,
    index: usize,
    dir: String,
) -> Result<(), StepError> {
    let command = provision_context
        .factory
        .invocations()
        .get(index.saturating_sub(1))
        .map(|inv| inv.command.clone())
        .ok_or_else(|| StepError::Assertion(format!("step {index} was not sent")))?;
    if command.contains(&format!("cd {dir} && ")) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "step {index} did not change into {dir}: {command}"
        )))
    }
}

#[then("only privileged steps were escalated")]
fn escalation_matches_modes(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let plan = provision_context
        .plan
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("no plan was chosen")))?;
    let expected: Vec<bool> = plan
        .steps()
        .iter()
        .map(|step| step.mode == ExecutionMode::Privileged)
        .collect();
    let actual: Vec<bool> = provision_context
        .factory
        .invocations()
        .iter()
        .map(|inv| inv.is_escalated(DEFAULT_ESCALATION))
        .collect();
    if expected == actual {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "escalation flags {actual:?} do not match modes {expected:?}"
        )))
    }
}

#[then("the session was closed")]
fn session_closed(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let factory = &provision_context.factory;
    if factory.opened() == 1 && factory.closed() == 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "opened {} sessions and closed {}",
            factory.opened(),
            factory.closed()
        )))
    }
}

#[then("every command runs under \"{shell}\"")]
fn commands_use_shell(
    provision_context: &ProvisionContext,
    shell: String,
) -> Result<(), StepError> {
    let stray: Vec<String> = provision_context
        .factory
        .invocations()
        .into_iter()
        .map(|inv| inv.command)
        .filter(|command| {
            let unescalated = command
                .strip_prefix(DEFAULT_ESCALATION)
                .map_or(command.as_str(), str::trim_start);
            !unescalated.starts_with(&format!("{shell} '"))
        })
        .collect();
    if stray.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "commands not run under {shell}: {stray:?}"
        )))
    }
}

#[then("the last command appends to \"{file}\"")]
fn last_command_appends(
    provision_context: &ProvisionContext,
    file: String,
) -> Result<(), StepError> {
    let last = provision_context
        .factory
        .invocations()
        .last()
        .map(|inv| inv.command.clone())
        .unwrap_or_default();
    if last.contains(&format!(">> {file}")) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "last command does not append to {file}: {last}"
        )))
    }
}

fn failure(provision_context: &ProvisionContext) -> Result<&ProvisionError, StepError> {
    match provision_context.outcome {
        Some(Err(ref err)) => Ok(err),
        Some(Ok(_)) => Err(StepError::Assertion(String::from(
            "expected failure, got success",
        ))),
        None => Err(StepError::Assertion(String::from("plan was not executed"))),
    }
}
