//! Runs a provisioning plan against one host over one session.
//!
//! Steps run strictly in order. The first failure stops the plan and is
//! returned with the step's index and command; earlier steps are not undone
//! and nothing is retried. The session is closed whether the plan succeeds
//! or fails.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ProvisionError;
use crate::plan::{ExecutionMode, ProvisioningPlan, Step, WorkDir};
use crate::render::{self, DEFAULT_ESCALATION};
use crate::session::{Session, SessionFactory};
use crate::target::HostTarget;
use crate::workdir::{self, WorkDirError};

/// Executor settings supplied at construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutorSettings {
    /// Prefix placed in front of privileged steps.
    pub escalation: String,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            escalation: DEFAULT_ESCALATION.to_owned(),
        }
    }
}

/// Where the executor is in a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionState {
    /// Nothing has happened yet.
    NotStarted,
    /// Opening the session.
    Connecting,
    /// Running the 1-based step.
    Running(usize),
    /// Every step succeeded.
    Succeeded,
    /// The run stopped; `step` is absent when connecting failed.
    Failed {
        /// 1-based index of the failing step.
        step: Option<usize>,
    },
}

impl ExecutionState {
    /// Returns `true` for [`ExecutionState::Succeeded`] and
    /// [`ExecutionState::Failed`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

/// Result of one successful step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepOutcome {
    /// 1-based step index.
    pub index: usize,
    /// Plan-level description of the step.
    pub description: String,
    /// Working directory the step ran in, after glob resolution.
    pub workdir: Option<String>,
    /// Exact command sent to the host.
    pub command: String,
    /// Exit status reported by the host.
    pub exit_code: Option<i32>,
}

/// Outcomes of a plan that ran to completion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutionReport {
    /// Plan name.
    pub plan: String,
    /// One outcome per step, in order.
    pub steps: Vec<StepOutcome>,
}

/// A step rendered without connecting, for previews.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RenderedStep {
    /// 1-based step index.
    pub index: usize,
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Working directory override as written in the plan.
    pub workdir: Option<WorkDir>,
    /// Command that would be sent. Glob directories appear unresolved.
    pub command: String,
}

/// Renders every step of `plan` as it would be sent to `target`, without
/// resolving globs or connecting.
#[must_use]
pub fn preview(
    target: &HostTarget,
    plan: &ProvisioningPlan,
    settings: &ExecutorSettings,
) -> Vec<RenderedStep> {
    plan.steps()
        .iter()
        .enumerate()
        .map(|(offset, step)| RenderedStep {
            index: offset + 1,
            mode: step.mode,
            workdir: step.workdir.clone(),
            command: render::remote_command(
                step,
                step.workdir.as_ref().map(WorkDir::as_str),
                target.shell(),
                &settings.escalation,
            ),
        })
        .collect()
}

/// Drives plans through sessions opened by a [`SessionFactory`].
#[derive(Debug)]
pub struct Executor<F: SessionFactory> {
    factory: F,
    settings: ExecutorSettings,
    state: ExecutionState,
}

impl<F: SessionFactory> Executor<F> {
    /// Creates an executor.
    #[must_use]
    pub const fn new(factory: F, settings: ExecutorSettings) -> Self {
        Self {
            factory,
            settings,
            state: ExecutionState::NotStarted,
        }
    }

    /// State reached by the most recent run.
    #[must_use]
    pub const fn state(&self) -> ExecutionState {
        self.state
    }

    /// Runs every step of `plan` on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Connection`] when the session cannot be
    /// opened, or the first step failure: [`ProvisionError::CommandFailed`],
    /// [`ProvisionError::AmbiguousPath`],
    /// [`ProvisionError::PrivilegeEscalationFailed`],
    /// [`ProvisionError::ConnectionLost`], [`ProvisionError::StepSpawn`] or
    /// [`ProvisionError::InvalidWorkDir`].
    pub fn execute(
        &mut self,
        target: &HostTarget,
        plan: &ProvisioningPlan,
    ) -> Result<ExecutionReport, ProvisionError> {
        self.transition(ExecutionState::NotStarted);
        info!(
            plan = plan.name(),
            host = target.host(),
            config = %target.ssh_config(),
            steps = plan.len(),
            "starting plan"
        );

        self.transition(ExecutionState::Connecting);
        let mut session = match self.factory.open(target) {
            Ok(session) => session,
            Err(err) => {
                self.transition(ExecutionState::Failed { step: None });
                return Err(err);
            }
        };

        let result = self.run_steps(&mut session, target, plan);
        if let Err(err) = session.close() {
            warn!(host = target.host(), error = %err, "failed to close session");
        }

        match &result {
            Ok(_) => self.transition(ExecutionState::Succeeded),
            Err(err) => self.transition(ExecutionState::Failed {
                step: err.step_index(),
            }),
        }
        result
    }

    fn transition(&mut self, next: ExecutionState) {
        debug!(from = ?self.state, to = ?next, "executor state change");
        self.state = next;
    }

    fn run_steps(
        &mut self,
        session: &mut F::Session,
        target: &HostTarget,
        plan: &ProvisioningPlan,
    ) -> Result<ExecutionReport, ProvisionError> {
        let mut steps = Vec::with_capacity(plan.len());
        for (offset, step) in plan.steps().iter().enumerate() {
            let index = offset + 1;
            self.transition(ExecutionState::Running(index));
            steps.push(self.run_step(session, target, index, step)?);
        }

        info!(plan = plan.name(), steps = steps.len(), "plan succeeded");
        Ok(ExecutionReport {
            plan: plan.name().to_owned(),
            steps,
        })
    }

    fn run_step(
        &self,
        session: &mut F::Session,
        target: &HostTarget,
        index: usize,
        step: &Step,
    ) -> Result<StepOutcome, ProvisionError> {
        let description = step.action.describe();
        let workdir = match &step.workdir {
            None => None,
            Some(WorkDir::Path(dir)) => Some(dir.clone()),
            Some(WorkDir::Glob(pattern)) => {
                Some(resolve_glob(session, index, &description, pattern)?)
            }
        };

        let command = render::remote_command(
            step,
            workdir.as_deref(),
            target.shell(),
            &self.settings.escalation,
        );
        info!(
            step = index,
            mode = ?step.mode,
            workdir = workdir.as_deref().unwrap_or("~"),
            command = %description,
            "running step"
        );

        let output = session
            .run(&command)
            .map_err(|err| at_step(err, index, &description))?;

        if output.is_success() {
            debug!(step = index, "step succeeded");
            return Ok(StepOutcome {
                index,
                description,
                workdir,
                command,
                exit_code: output.exit_code,
            });
        }

        warn!(step = index, status = ?output.exit_code, "step failed");
        if step.mode.is_privileged()
            && render::is_escalation_refusal(&output.stderr, &self.settings.escalation)
        {
            return Err(ProvisionError::PrivilegeEscalationFailed {
                index,
                command: description,
                stderr: output.stderr,
            });
        }

        Err(ProvisionError::CommandFailed {
            index,
            command: description,
            status: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

fn resolve_glob<S: Session>(
    session: &mut S,
    index: usize,
    description: &str,
    pattern: &str,
) -> Result<String, ProvisionError> {
    let (parent, _) = workdir::split_pattern(pattern);
    let listing = session
        .list(parent)
        .map_err(|err| at_step(err, index, description))?;
    if !listing.is_success() {
        return Err(ProvisionError::CommandFailed {
            index,
            command: description.to_owned(),
            status: listing.exit_code,
            stdout: listing.stdout,
            stderr: listing.stderr,
        });
    }

    let directories = workdir::parse_listing(&listing.stdout);
    let resolved = workdir::resolve_one(pattern, &directories).map_err(|err| match err {
        WorkDirError::Ambiguous { pattern, matches } => ProvisionError::AmbiguousPath {
            index,
            command: description.to_owned(),
            pattern,
            matches,
        },
        WorkDirError::InvalidPattern { pattern, message } => ProvisionError::InvalidWorkDir {
            index,
            command: description.to_owned(),
            pattern,
            message,
        },
    })?;
    debug!(step = index, pattern, resolved = %resolved, "resolved working directory");
    Ok(resolved)
}

fn at_step(err: ProvisionError, index: usize, description: &str) -> ProvisionError {
    match err {
        ProvisionError::Connection { host, message } => ProvisionError::ConnectionLost {
            index,
            command: description.to_owned(),
            host,
            message,
        },
        ProvisionError::Spawn { program, message } => ProvisionError::StepSpawn {
            index,
            command: description.to_owned(),
            program,
            message,
        },
        other => other,
    }
}
