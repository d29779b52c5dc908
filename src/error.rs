//! Errors surfaced while connecting to a host or running a plan.
//!
//! Step failures carry the 1-based step index and the step's command text
//! so the operator can see exactly where a plan stopped.

use thiserror::Error;

use crate::plan::PlanError;

/// Errors raised by sessions and the executor.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}: set PROVISION_{env_suffix} or add {field} to provision.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when a plan cannot be built.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// Raised when a local program cannot be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the host cannot be reached or authentication fails.
    #[error("cannot connect to {host}: {message}")]
    Connection {
        /// Host alias from the SSH configuration.
        host: String,
        /// Diagnostic text reported by the SSH client.
        message: String,
    },
    /// Raised when the SSH connection drops while a step is running.
    #[error("step {index} ({command}): connection to {host} lost: {message}")]
    ConnectionLost {
        /// 1-based index of the step that was running.
        index: usize,
        /// Command text of the step.
        command: String,
        /// Host alias from the SSH configuration.
        host: String,
        /// Diagnostic text reported by the SSH client.
        message: String,
    },
    /// Raised when a remote command exits unsuccessfully.
    #[error("step {index} ({command}) exited with status {}", status.map_or_else(|| String::from("unknown"), |code| code.to_string()))]
    CommandFailed {
        /// 1-based index of the failing step.
        index: usize,
        /// Command text of the step.
        command: String,
        /// Exit status, absent when the command was killed or timed out.
        status: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },
    /// Raised when a local program fails while a step is running.
    #[error("step {index} ({command}): failed to spawn {program}: {message}")]
    StepSpawn {
        /// 1-based index of the step.
        index: usize,
        /// Command text of the step.
        command: String,
        /// Program that failed.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a step's glob working directory is not a valid pattern.
    #[error("step {index} ({command}): invalid working directory pattern {pattern:?}: {message}")]
    InvalidWorkDir {
        /// 1-based index of the step.
        index: usize,
        /// Command text of the step.
        command: String,
        /// Glob pattern from the plan.
        pattern: String,
        /// Parser error.
        message: String,
    },
    /// Raised when a glob working directory does not match exactly one
    /// directory.
    #[error("step {index} ({command}): working directory {pattern:?} matched {} directories {matches:?}; expected exactly one", matches.len())]
    AmbiguousPath {
        /// 1-based index of the step.
        index: usize,
        /// Command text of the step.
        command: String,
        /// Glob pattern from the plan.
        pattern: String,
        /// Directories that matched.
        matches: Vec<String>,
    },
    /// Raised when the escalation program refuses to run a privileged step.
    #[error("step {index} ({command}): privilege escalation failed: {}", stderr.trim())]
    PrivilegeEscalationFailed {
        /// 1-based index of the step.
        index: usize,
        /// Command text of the step.
        command: String,
        /// Captured standard error from the escalation program.
        stderr: String,
    },
}

impl ProvisionError {
    /// Index of the step that failed, when the failure belongs to a step.
    #[must_use]
    pub const fn step_index(&self) -> Option<usize> {
        match self {
            Self::ConnectionLost { index, .. }
            | Self::CommandFailed { index, .. }
            | Self::StepSpawn { index, .. }
            | Self::InvalidWorkDir { index, .. }
            | Self::AmbiguousPath { index, .. }
            | Self::PrivilegeEscalationFailed { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Captured remote output `(stdout, stderr)`, when the failure has any.
    #[must_use]
    pub fn captured_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::CommandFailed { stdout, stderr, .. } => Some((stdout, stderr)),
            Self::PrivilegeEscalationFailed { stderr, .. } => Some(("", stderr)),
            _ => None,
        }
    }

    /// Returns `true` for connection and authentication failures.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::ConnectionLost { .. })
    }
}
