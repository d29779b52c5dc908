//! Executor and SSH client settings loaded via `ortho-config`.
//!
//! Values merge defaults, `provision.toml` discovered in the usual places,
//! and `PROVISION_*` environment variables. The loaded value is handed to
//! the executor explicitly; nothing reads process-wide state after start-up.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::error::ProvisionError;
use crate::executor::ExecutorSettings;
use crate::render::DEFAULT_ESCALATION;
use crate::session::SshSettings;
use crate::target::DEFAULT_HOST;

/// Default time allowed for the SSH control master to authenticate.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Provisioning settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "PROVISION",
    discovery(
        app_name = "provision",
        env_var = "PROVISION_CONFIG_PATH",
        config_file_name = "provision.toml",
        dotfile_name = ".provision.toml",
        project_file_name = "provision.toml"
    )
)]
pub struct ProvisionConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Host alias from the SSH configuration file.
    #[ortho_config(default = DEFAULT_HOST.to_owned())]
    pub host: String,
    /// Prefix used for privileged steps.
    #[ortho_config(default = DEFAULT_ESCALATION.to_owned())]
    pub escalation: String,
    /// Whether to force batch mode for SSH to avoid password prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Seconds allowed for the connection to be established.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
    /// Optional limit, in seconds, on each step. Unset means no limit.
    pub step_timeout_secs: Option<u64>,
}

/// Errors raised when loading configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl ProvisionConfig {
    /// Loads configuration from defaults, configuration files, and
    /// environment variables, without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigLoadError> {
        Self::load_from_iter([std::ffi::OsString::from("provision")])
            .map_err(|err| ConfigLoadError::Parse(err.to_string()))
    }

    /// Ensures required values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::InvalidConfig`] naming the first empty field,
    /// or a zero timeout.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.host, "host")?;
        Self::require_value(&self.escalation, "escalation")?;
        if self.connect_timeout_secs == 0 {
            return Err(Self::invalid("connect_timeout_secs"));
        }
        if self.step_timeout_secs == Some(0) {
            return Err(Self::invalid("step_timeout_secs"));
        }
        Ok(())
    }

    /// SSH client settings for the session factory.
    #[must_use]
    pub fn ssh_settings(&self) -> SshSettings {
        SshSettings {
            ssh_bin: self.ssh_bin.clone(),
            batch_mode: self.ssh_batch_mode,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    /// Settings for the executor.
    #[must_use]
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            escalation: self.escalation.clone(),
        }
    }

    /// Per-step limit, if configured.
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    fn require_value(value: &str, field: &str) -> Result<(), ProvisionError> {
        if value.trim().is_empty() {
            return Err(Self::invalid(field));
        }
        Ok(())
    }

    fn invalid(field: &str) -> ProvisionError {
        ProvisionError::InvalidConfig {
            field: field.to_owned(),
        }
    }
}
