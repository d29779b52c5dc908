//! Remote sessions: the transport seam between the executor and a host.
//!
//! The executor only sees the [`Session`] trait. Production code opens
//! [`SshSession`]s through [`SshSessionFactory`]; tests substitute a
//! recording session from [`crate::test_support`].

use crate::error::ProvisionError;
use crate::target::HostTarget;

mod runner;
mod ssh;

pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner, StreamingCommandRunner};
pub use ssh::{SshOptions, SshSession, SshSessionFactory, SshSettings};

/// Output captured from a command executed on the remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommandOutput {
    /// Exit code reported by the remote command, absent when the client was
    /// killed or timed out.
    pub exit_code: Option<i32>,
    /// Captured standard output stream.
    pub stdout: String,
    /// Captured standard error stream.
    pub stderr: String,
}

impl RemoteCommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// An open connection to one host, exclusively owned by whoever opened it.
pub trait Session {
    /// Runs `command` on the host and waits for it to finish.
    ///
    /// A non-zero exit status is reported in the output, not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Connection`] when the connection is lost and
    /// [`ProvisionError::Spawn`] when the local client cannot be started.
    fn run(&mut self, command: &str) -> Result<RemoteCommandOutput, ProvisionError>;

    /// Lists entries of `parent` on the host, one per line, with directories
    /// suffixed by `/`. Listings are bookkeeping, not plan steps.
    ///
    /// # Errors
    ///
    /// As for [`Session::run`].
    fn list(&mut self, parent: &str) -> Result<RemoteCommandOutput, ProvisionError>;

    /// Releases the connection. Calling it more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Spawn`] when the close request cannot be
    /// sent.
    fn close(&mut self) -> Result<(), ProvisionError>;
}

/// Opens sessions for host targets.
pub trait SessionFactory {
    /// Session type produced by the factory.
    type Session: Session;

    /// Connects to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Connection`] when the host cannot be reached
    /// or authentication fails.
    fn open(&self, target: &HostTarget) -> Result<Self::Session, ProvisionError>;
}
