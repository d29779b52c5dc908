//! OpenSSH session multiplexed over a single control master.
//!
//! Opening the session starts `ssh -M -N` as a child process bound to a
//! control socket in a private temporary directory. Every step then runs as
//! a lightweight client of that socket, so the whole plan shares one
//! authenticated connection. The master is told to exit on [`Session::close`]
//! and again, if still needed, when the session is dropped.

use std::ffi::OsString;
use std::fs::{File, read_to_string};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use super::runner::CommandRunner;
use super::{RemoteCommandOutput, Session, SessionFactory};
use crate::error::ProvisionError;
use crate::render::listing_command;
use crate::target::HostTarget;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const MASTER_EXIT_GRACE: Duration = Duration::from_secs(2);
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Client settings shared by every session a factory opens.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshSettings {
    /// Path to the `ssh` executable.
    pub ssh_bin: String,
    /// Whether to pass `BatchMode=yes` so the client never prompts.
    pub batch_mode: bool,
    /// How long to wait for the control master to authenticate.
    pub connect_timeout: Duration,
}

/// Fully resolved options for one session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshOptions {
    /// Path to the `ssh` executable.
    pub ssh_bin: String,
    /// SSH configuration file passed with `-F`.
    pub config_path: Utf8PathBuf,
    /// Host alias looked up in the configuration file.
    pub host: String,
    /// Whether to pass `BatchMode=yes`.
    pub batch_mode: bool,
    /// How long to wait for the control master to authenticate.
    pub connect_timeout: Duration,
}

impl SshOptions {
    /// Combines factory settings with a host target.
    #[must_use]
    pub fn new(settings: &SshSettings, target: &HostTarget) -> Self {
        Self {
            ssh_bin: settings.ssh_bin.clone(),
            config_path: target.ssh_config().to_path_buf(),
            host: target.host().to_owned(),
            batch_mode: settings.batch_mode,
            connect_timeout: settings.connect_timeout,
        }
    }

    fn common_args(&self, control_path: &Utf8Path) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-F"),
            OsString::from(self.config_path.as_str()),
        ];
        if self.batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }
        args.push(OsString::from("-S"));
        args.push(OsString::from(control_path.as_str()));
        args
    }

    /// Arguments that start the control master in the foreground.
    #[must_use]
    pub fn master_args(&self, control_path: &Utf8Path) -> Vec<OsString> {
        let mut args = self.common_args(control_path);
        args.extend([
            OsString::from("-M"),
            OsString::from("-N"),
            OsString::from("-o"),
            OsString::from(format!(
                "ConnectTimeout={}",
                self.connect_timeout.as_secs().max(1)
            )),
            OsString::from(self.host.as_str()),
        ]);
        args
    }

    /// Arguments that run `command` through the control master.
    #[must_use]
    pub fn command_args(&self, control_path: &Utf8Path, command: &str) -> Vec<OsString> {
        let mut args = self.common_args(control_path);
        args.push(OsString::from(self.host.as_str()));
        args.push(OsString::from(command));
        args
    }

    /// Arguments that send a control request (`check`, `exit`) to the master.
    #[must_use]
    pub fn control_args(&self, control_path: &Utf8Path, request: &str) -> Vec<OsString> {
        let mut args = self.common_args(control_path);
        args.push(OsString::from("-O"));
        args.push(OsString::from(request));
        args.push(OsString::from(self.host.as_str()));
        args
    }
}

/// Opens [`SshSession`]s with a shared runner and client settings.
#[derive(Clone, Debug)]
pub struct SshSessionFactory<R: CommandRunner + Clone> {
    runner: R,
    settings: SshSettings,
}

impl<R: CommandRunner + Clone> SshSessionFactory<R> {
    /// Creates a factory.
    #[must_use]
    pub const fn new(runner: R, settings: SshSettings) -> Self {
        Self { runner, settings }
    }
}

impl<R: CommandRunner + Clone> SessionFactory for SshSessionFactory<R> {
    type Session = SshSession<R>;

    fn open(&self, target: &HostTarget) -> Result<Self::Session, ProvisionError> {
        SshSession::open(self.runner.clone(), SshOptions::new(&self.settings, target))
    }
}

/// One multiplexed SSH connection to a host.
#[derive(Debug)]
pub struct SshSession<R: CommandRunner> {
    runner: R,
    options: SshOptions,
    control_path: Utf8PathBuf,
    master: Option<Child>,
    closed: bool,
    _control_dir: TempDir,
}

impl<R: CommandRunner> SshSession<R> {
    /// Starts a control master and waits until it accepts clients.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Spawn`] when `ssh` cannot be started and
    /// [`ProvisionError::Connection`] when the master exits or does not become
    /// ready within the connect timeout.
    pub fn open(runner: R, options: SshOptions) -> Result<Self, ProvisionError> {
        let control_dir = private_dir(&options.host)?;
        let control_path = control_path_in(&control_dir, &options.host)?;
        let log_path = control_path.with_file_name("master.log");
        let log = File::create(&log_path).map_err(|err| ProvisionError::Connection {
            host: options.host.clone(),
            message: format!("cannot create {log_path}: {err}"),
        })?;

        debug!(host = %options.host, config = %options.config_path, "starting ssh control master");
        let master = Command::new(&options.ssh_bin)
            .args(options.master_args(&control_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|err| ProvisionError::Spawn {
                program: options.ssh_bin.clone(),
                message: err.to_string(),
            })?;

        let mut session = Self {
            runner,
            options,
            control_path,
            master: Some(master),
            closed: false,
            _control_dir: control_dir,
        };
        session.wait_until_ready(&log_path)?;
        Ok(session)
    }

    /// Attaches to a control socket inside `control_dir` whose master is
    /// managed elsewhere. Closing still sends `-O exit`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Connection`] when the directory path is not
    /// valid UTF-8.
    pub fn attach(
        runner: R,
        options: SshOptions,
        control_dir: TempDir,
    ) -> Result<Self, ProvisionError> {
        let control_path = control_path_in(&control_dir, &options.host)?;
        Ok(Self {
            runner,
            options,
            control_path,
            master: None,
            closed: false,
            _control_dir: control_dir,
        })
    }

    /// Path of the control socket.
    #[must_use]
    pub fn control_path(&self) -> &Utf8Path {
        &self.control_path
    }

    fn wait_until_ready(&mut self, log_path: &Utf8Path) -> Result<(), ProvisionError> {
        let deadline = Instant::now() + self.options.connect_timeout;
        loop {
            if let Some(status) = self.master_status()? {
                let log = read_to_string(log_path).unwrap_or_default();
                let message = if log.trim().is_empty() {
                    format!("ssh exited with {status}")
                } else {
                    log.trim().to_owned()
                };
                self.master = None;
                self.closed = true;
                return Err(self.connection_error(message));
            }

            if self.control_request("check")?.is_success() {
                debug!(host = %self.options.host, "ssh control master ready");
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(self.connection_error(format!(
                    "control master not ready after {}s",
                    self.options.connect_timeout.as_secs()
                )));
            }
            thread::sleep(READY_POLL_INTERVAL);
        }
    }

    fn master_status(&mut self) -> Result<Option<ExitStatus>, ProvisionError> {
        let Some(master) = self.master.as_mut() else {
            return Ok(None);
        };
        master.try_wait().map_err(|err| ProvisionError::Connection {
            host: self.options.host.clone(),
            message: err.to_string(),
        })
    }

    fn control_request(&self, request: &str) -> Result<super::CommandOutput, ProvisionError> {
        let args = self.options.control_args(&self.control_path, request);
        self.runner.run_captured(&self.options.ssh_bin, &args)
    }

    fn remote(&self, command: &str, captured: bool) -> Result<RemoteCommandOutput, ProvisionError> {
        let args = self.options.command_args(&self.control_path, command);
        let output = if captured {
            self.runner.run_captured(&self.options.ssh_bin, &args)?
        } else {
            self.runner.run(&self.options.ssh_bin, &args)?
        };

        // 255 is also a legal remote status, so only a dead master counts as
        // a dropped connection.
        if output.code == Some(SSH_CONNECTION_FAILURE)
            && !self.control_request("check")?.is_success()
        {
            return Err(self.connection_error(output.stderr.trim().to_owned()));
        }

        Ok(RemoteCommandOutput {
            exit_code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn connection_error(&self, message: String) -> ProvisionError {
        ProvisionError::Connection {
            host: self.options.host.clone(),
            message,
        }
    }

    fn reap_master(&mut self) {
        let Some(mut master) = self.master.take() else {
            return;
        };
        let deadline = Instant::now() + MASTER_EXIT_GRACE;
        loop {
            match master.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => thread::sleep(READY_POLL_INTERVAL),
                Ok(None) | Err(_) => break,
            }
        }
        warn!(host = %self.options.host, "ssh control master did not exit; killing it");
        if let Err(err) = master.kill().and_then(|()| master.wait().map(drop)) {
            warn!(host = %self.options.host, error = %err, "failed to kill ssh control master");
        }
    }
}

impl<R: CommandRunner> Session for SshSession<R> {
    fn run(&mut self, command: &str) -> Result<RemoteCommandOutput, ProvisionError> {
        self.remote(command, false)
    }

    fn list(&mut self, parent: &str) -> Result<RemoteCommandOutput, ProvisionError> {
        self.remote(&listing_command(parent), true)
    }

    fn close(&mut self) -> Result<(), ProvisionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.control_request("exit");
        self.reap_master();
        debug!(host = %self.options.host, "ssh session closed");
        result.map(drop)
    }
}

impl<R: CommandRunner> Drop for SshSession<R> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(host = %self.options.host, error = %err, "failed to close ssh session");
        }
    }
}

fn private_dir(host: &str) -> Result<TempDir, ProvisionError> {
    tempfile::Builder::new()
        .prefix("provision-ssh-")
        .tempdir()
        .map_err(|err| ProvisionError::Connection {
            host: host.to_owned(),
            message: format!("cannot create control directory: {err}"),
        })
}

fn control_path_in(dir: &TempDir, host: &str) -> Result<Utf8PathBuf, ProvisionError> {
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
        ProvisionError::Connection {
            host: host.to_owned(),
            message: format!("control directory {} is not valid UTF-8", path.display()),
        }
    })?;
    Ok(base.join("control.sock"))
}
