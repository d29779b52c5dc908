//! Core library for the `provision` tool.
//!
//! A provisioning plan is an ordered list of shell steps, some of them
//! privileged, some run inside a directory found by glob. The executor runs
//! a plan against one host over a single SSH session and stops at the first
//! failing step.

pub mod config;
pub mod error;
pub mod executor;
pub mod plan;
pub mod profiles;
pub mod render;
pub mod session;
pub mod target;
pub mod test_support;
pub mod workdir;

pub use config::{ConfigLoadError, DEFAULT_CONNECT_TIMEOUT_SECS, ProvisionConfig};
pub use error::ProvisionError;
pub use executor::{
    ExecutionReport, ExecutionState, Executor, ExecutorSettings, RenderedStep, StepOutcome,
    preview,
};
pub use plan::{
    ExecutionMode, PlanError, ProvisioningPlan, StartupShell, Step, StepAction, WorkDir,
};
pub use profiles::{DEFAULT_TASK, Profile};
pub use session::{
    CommandOutput, CommandRunner, ProcessCommandRunner, RemoteCommandOutput, Session,
    SessionFactory, SshOptions, SshSession, SshSessionFactory, SshSettings,
    StreamingCommandRunner,
};
pub use target::{DEFAULT_HOST, HostTarget, resolve_config_path};
