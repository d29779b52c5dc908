//! Provisioning plan model: ordered steps with an execution mode and an
//! optional working directory.
//!
//! A [`ProvisioningPlan`] is built once per invocation and handed to the
//! executor by shared reference, so it cannot change while steps run.

use glob::Pattern;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while building plans.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PlanError {
    /// Raised when a working-directory glob cannot be compiled.
    #[error("invalid working-directory pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Pattern as written in the plan.
        pattern: String,
        /// Parser message from the glob compiler.
        message: String,
    },
    /// Raised when a profile name is not one of the built-in profiles.
    #[error("unknown profile {0:?}; run `provision list` to see available profiles")]
    UnknownProfile(String),
    /// Raised when a profile does not expose the requested task.
    #[error("profile {profile} has no task {task:?}")]
    UnknownTask {
        /// Profile that was asked for the task.
        profile: String,
        /// Task name that was requested.
        task: String,
    },
}

/// Whether a step runs as the login user or with escalated privileges.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Runs under the invoking user's shell.
    Normal,
    /// Runs through the configured escalation program (for example `sudo`).
    Privileged,
}

impl ExecutionMode {
    /// Returns `true` for [`ExecutionMode::Privileged`].
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Privileged)
    }
}

/// Working directory override applied before a step's command.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WorkDir {
    /// Literal directory, used as written.
    Path(String),
    /// Glob that must resolve to exactly one directory on the remote host.
    Glob(String),
}

impl WorkDir {
    /// Builds a literal directory override.
    #[must_use]
    pub fn path(dir: impl Into<String>) -> Self {
        Self::Path(dir.into())
    }

    /// Builds a glob override after checking that the pattern compiles.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidPattern`] when the pattern is malformed.
    pub fn glob(pattern: impl Into<String>) -> Result<Self, PlanError> {
        let pattern = pattern.into();
        Pattern::new(&pattern).map_err(|err| PlanError::InvalidPattern {
            message: err.msg.to_owned(),
            pattern: pattern.clone(),
        })?;
        Ok(Self::Glob(pattern))
    }

    /// Directory or pattern text as written in the plan.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Path(dir) | Self::Glob(dir) => dir,
        }
    }
}

/// Login shell family on the remote host, which decides the startup file
/// and the syntax of environment lines.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupShell {
    /// C shell family (`csh`, `tcsh`).
    Csh,
    /// Bourne-again shell.
    Bash,
}

impl StartupShell {
    /// Startup file, relative to the remote user's home directory.
    #[must_use]
    pub const fn startup_file(self) -> &'static str {
        match self {
            Self::Csh => ".cshrc",
            Self::Bash => ".bashrc",
        }
    }

    /// Renders an environment assignment in this shell's syntax.
    #[must_use]
    pub fn env_line(self, var: &str, value: &str) -> String {
        match self {
            Self::Csh => format!("setenv {var} {value}"),
            Self::Bash => format!("export {var}={value}"),
        }
    }
}

/// What a step does on the remote host.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    /// Runs a shell command verbatim.
    Run {
        /// Command text handed to the remote shell.
        command: String,
    },
    /// Appends one line to a file; never truncates.
    AppendLine {
        /// Target file, relative to the remote working directory.
        file: String,
        /// Line appended as-is, followed by a newline.
        line: String,
    },
}

impl StepAction {
    /// Human-readable summary used in logs and error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Run { command } => command.clone(),
            Self::AppendLine { file, line } => format!("append {line:?} to {file}"),
        }
    }
}

/// One ordered unit of provisioning work.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Step {
    /// Action performed by the step.
    pub action: StepAction,
    /// Whether the step runs with escalated privileges.
    pub mode: ExecutionMode,
    /// Optional directory the action runs in.
    pub workdir: Option<WorkDir>,
}

impl Step {
    /// A command run as the login user.
    #[must_use]
    pub fn run(command: impl Into<String>) -> Self {
        Self::command(command, ExecutionMode::Normal)
    }

    /// A command run with escalated privileges.
    #[must_use]
    pub fn sudo(command: impl Into<String>) -> Self {
        Self::command(command, ExecutionMode::Privileged)
    }

    /// Appends `line` to `file` as the login user.
    #[must_use]
    pub fn append_line(file: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            action: StepAction::AppendLine {
                file: file.into(),
                line: line.into(),
            },
            mode: ExecutionMode::Normal,
            workdir: None,
        }
    }

    /// Appends an environment assignment to the shell's startup file.
    #[must_use]
    pub fn append_env(shell: StartupShell, var: &str, value: &str) -> Self {
        Self::append_line(shell.startup_file(), shell.env_line(var, value))
    }

    /// Runs the step inside `workdir`.
    #[must_use]
    pub fn in_dir(mut self, workdir: WorkDir) -> Self {
        self.workdir = Some(workdir);
        self
    }

    fn command(command: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            action: StepAction::Run {
                command: command.into(),
            },
            mode,
            workdir: None,
        }
    }
}

/// Named, ordered list of steps for one host profile.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProvisioningPlan {
    name: String,
    steps: Vec<Step>,
}

impl ProvisioningPlan {
    /// Creates a plan from its steps, in execution order.
    #[must_use]
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Plan name, usually `<profile>:<task>`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` when the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
