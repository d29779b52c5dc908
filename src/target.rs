//! Host targets and SSH configuration discovery.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

use crate::render::DEFAULT_SHELL;

/// SSH configuration file preferred when present in the invocation directory.
pub const USER_SSH_CONFIG: &str = "user_ssh_config";

/// SSH configuration file used when no user file exists.
pub const DEFAULT_SSH_CONFIG: &str = "ssh_config";

/// Host alias used when none is given.
pub const DEFAULT_HOST: &str = "default";

/// Picks the SSH configuration file for an invocation from `cwd`.
///
/// Returns `cwd/user_ssh_config` when that file exists, otherwise
/// `cwd/ssh_config`. A directory that cannot be read counts as having no
/// user file.
#[must_use]
pub fn resolve_config_path(cwd: &Utf8Path) -> Utf8PathBuf {
    let user_file_exists = Dir::open_ambient_dir(cwd, ambient_authority())
        .and_then(|dir| dir.try_exists(USER_SSH_CONFIG))
        .unwrap_or(false);

    if user_file_exists {
        cwd.join(USER_SSH_CONFIG)
    } else {
        cwd.join(DEFAULT_SSH_CONFIG)
    }
}

/// The host a plan runs against.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostTarget {
    host: String,
    ssh_config: Utf8PathBuf,
    shell: String,
}

impl HostTarget {
    /// Creates a target from explicit values.
    #[must_use]
    pub fn new(host: impl Into<String>, ssh_config: impl Into<Utf8PathBuf>) -> Self {
        Self {
            host: host.into(),
            ssh_config: ssh_config.into(),
            shell: DEFAULT_SHELL.to_owned(),
        }
    }

    /// Creates a target whose SSH configuration is discovered in `cwd`.
    #[must_use]
    pub fn discover(host: impl Into<String>, cwd: &Utf8Path) -> Self {
        Self::new(host, resolve_config_path(cwd))
    }

    /// Overrides the shell prefix steps run under (for example
    /// `/bin/sh -c` on hosts whose login shell is `csh`).
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Host alias from the SSH configuration.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// SSH configuration file.
    #[must_use]
    pub fn ssh_config(&self) -> &Utf8Path {
        &self.ssh_config
    }

    /// Shell prefix steps run under.
    #[must_use]
    pub fn shell(&self) -> &str {
        &self.shell
    }
}
