//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ffi::OsString;
use std::rc::Rc;

use crate::error::ProvisionError;
use crate::session::{
    CommandOutput, CommandRunner, RemoteCommandOutput, Session, SessionFactory,
};
use crate::target::HostTarget;

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Final argument, which carries the remote command for `ssh`.
    #[must_use]
    pub fn last_arg(&self) -> Option<String> {
        self.args
            .last()
            .map(|arg| arg.to_string_lossy().into_owned())
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a specific exit code.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ProvisionError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ProvisionError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// A command received by a [`RecordingSession`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteInvocation {
    /// Command exactly as the executor rendered it.
    pub command: String,
}

impl RemoteInvocation {
    /// Returns `true` when the command starts with `escalation`.
    #[must_use]
    pub fn is_escalated(&self, escalation: &str) -> bool {
        self.command
            .strip_prefix(escalation)
            .is_some_and(|rest| rest.starts_with(' '))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    responses: VecDeque<Result<RemoteCommandOutput, ProvisionError>>,
    listings: HashMap<String, String>,
    invocations: Vec<RemoteInvocation>,
    listed: Vec<String>,
    connect_error: Option<String>,
    opened: usize,
    closed: usize,
}

/// Session factory whose sessions record commands instead of running them.
///
/// Commands succeed with empty output unless a response has been queued.
/// Clones share state, so a test can keep one handle and give another to
/// the executor.
#[derive(Clone, Debug, Default)]
pub struct RecordingFactory {
    state: Rc<RefCell<SessionState>>,
}

impl RecordingFactory {
    /// Creates a factory with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an output for the next command.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.state
            .borrow_mut()
            .responses
            .push_back(Ok(RemoteCommandOutput {
                exit_code: code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            }));
    }

    /// Queues a successful, silent command.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Queues a failing command with the given exit code.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Queues a dropped connection for the next command.
    pub fn push_connection_loss(&self, message: &str) {
        self.state
            .borrow_mut()
            .responses
            .push_back(Err(ProvisionError::Connection {
                host: String::from("default"),
                message: message.to_owned(),
            }));
    }

    /// Queues a local client failure, such as a broken pipe, for the next
    /// command.
    pub fn push_spawn_failure(&self, program: &str, message: &str) {
        self.state
            .borrow_mut()
            .responses
            .push_back(Err(ProvisionError::Spawn {
                program: program.to_owned(),
                message: message.to_owned(),
            }));
    }

    /// Sets the directories reported when `parent` is listed.
    pub fn set_directories(&self, parent: &str, names: &[&str]) {
        let listing: String = names.iter().map(|name| format!("{name}/\n")).collect();
        self.state
            .borrow_mut()
            .listings
            .insert(parent.to_owned(), listing);
    }

    /// Makes the next `open` fail with a connection error.
    pub fn fail_connect(&self, message: &str) {
        self.state.borrow_mut().connect_error = Some(message.to_owned());
    }

    /// Commands received so far, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<RemoteInvocation> {
        self.state.borrow().invocations.clone()
    }

    /// Parent directories listed so far, in order.
    #[must_use]
    pub fn listed(&self) -> Vec<String> {
        self.state.borrow().listed.clone()
    }

    /// Number of sessions opened.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.state.borrow().opened
    }

    /// Number of sessions closed.
    #[must_use]
    pub fn closed(&self) -> usize {
        self.state.borrow().closed
    }
}

impl SessionFactory for RecordingFactory {
    type Session = RecordingSession;

    fn open(&self, target: &HostTarget) -> Result<Self::Session, ProvisionError> {
        let mut state = self.state.borrow_mut();
        if let Some(message) = state.connect_error.take() {
            return Err(ProvisionError::Connection {
                host: target.host().to_owned(),
                message,
            });
        }
        state.opened += 1;
        Ok(RecordingSession {
            state: Rc::clone(&self.state),
            closed: false,
        })
    }
}

/// Session produced by [`RecordingFactory`].
#[derive(Debug)]
pub struct RecordingSession {
    state: Rc<RefCell<SessionState>>,
    closed: bool,
}

impl Session for RecordingSession {
    fn run(&mut self, command: &str) -> Result<RemoteCommandOutput, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.invocations.push(RemoteInvocation {
            command: command.to_owned(),
        });
        state.responses.pop_front().unwrap_or_else(|| {
            Ok(RemoteCommandOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        })
    }

    fn list(&mut self, parent: &str) -> Result<RemoteCommandOutput, ProvisionError> {
        let mut state = self.state.borrow_mut();
        state.listed.push(parent.to_owned());
        let listing = state.listings.get(parent).cloned();
        Ok(listing.map_or_else(
            || RemoteCommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("ls: {parent}: No such file or directory\n"),
            },
            |stdout| RemoteCommandOutput {
                exit_code: Some(0),
                stdout,
                stderr: String::new(),
            },
        ))
    }

    fn close(&mut self) -> Result<(), ProvisionError> {
        if !self.closed {
            self.closed = true;
            self.state.borrow_mut().closed += 1;
        }
        Ok(())
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close recording session");
        }
    }
}
