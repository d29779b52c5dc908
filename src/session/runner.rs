//! Local process execution behind a trait so sessions can be driven by
//! scripted fakes in tests.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ProvisionError;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ProvisionError>;

    /// Runs a bookkeeping command whose output is never shown to the user.
    ///
    /// # Errors
    ///
    /// As for [`CommandRunner::run`].
    fn run_captured(
        &self,
        program: &str,
        args: &[OsString],
    ) -> Result<CommandOutput, ProvisionError> {
        self.run(program, args)
    }
}

/// Runner that captures output silently.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner {
    timeout: Option<Duration>,
}

impl ProcessCommandRunner {
    /// Kills commands that run longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ProvisionError> {
        run_process(program, args, self.timeout, false)
    }
}

/// Runner that forwards output to the local terminal as it arrives while
/// also capturing it.
#[derive(Clone, Debug, Default)]
pub struct StreamingCommandRunner {
    timeout: Option<Duration>,
}

impl StreamingCommandRunner {
    /// Kills commands that run longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for StreamingCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ProvisionError> {
        run_process(program, args, self.timeout, true)
    }

    fn run_captured(
        &self,
        program: &str,
        args: &[OsString],
    ) -> Result<CommandOutput, ProvisionError> {
        run_process(program, args, self.timeout, false)
    }
}

type Sink = Box<dyn Write + Send>;

fn run_process(
    program: &str,
    args: &[OsString],
    timeout: Option<Duration>,
    echo: bool,
) -> Result<CommandOutput, ProvisionError> {
    let spawn_error = |message: String| ProvisionError::Spawn {
        program: program.to_owned(),
        message,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| spawn_error(err.to_string()))?;

    let stdout_sink: Option<Sink> = echo.then(|| Box::new(io::stdout()) as Sink);
    let stderr_sink: Option<Sink> = echo.then(|| Box::new(io::stderr()) as Sink);
    let stdout_reader = child.stdout.take().map(|pipe| drain(pipe, stdout_sink));
    let stderr_reader = child.stderr.take().map(|pipe| drain(pipe, stderr_sink));

    let status = wait_for_exit(&mut child, timeout).map_err(|err| spawn_error(err.to_string()))?;
    let stdout = collect(stdout_reader).map_err(spawn_error)?;
    let mut stderr = collect(stderr_reader).map_err(spawn_error)?;

    let code = match status {
        Exit::Code(code) => code,
        Exit::TimedOut(limit) => {
            stderr.push_str(&format!(
                "{program} timed out after {}s and was killed\n",
                limit.as_secs()
            ));
            None
        }
    };

    Ok(CommandOutput {
        code,
        stdout,
        stderr,
    })
}

enum Exit {
    Code(Option<i32>),
    TimedOut(Duration),
}

fn wait_for_exit(child: &mut Child, timeout: Option<Duration>) -> io::Result<Exit> {
    let Some(limit) = timeout else {
        return child.wait().map(|status| Exit::Code(status.code()));
    };

    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Exit::Code(status.code()));
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(Exit::TimedOut(limit));
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn drain<R>(mut source: R, mut sink: Option<Sink>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut captured = Vec::new();
        let mut buffer = [0_u8; 8192];
        loop {
            let read = source.read(&mut buffer)?;
            let Some(chunk) = buffer.get(..read).filter(|chunk| !chunk.is_empty()) else {
                break;
            };
            if let Some(out) = sink.as_mut() {
                out.write_all(chunk)?;
                out.flush()?;
            }
            captured.extend_from_slice(chunk);
        }
        Ok(captured)
    })
}

fn collect(reader: Option<JoinHandle<io::Result<Vec<u8>>>>) -> Result<String, String> {
    let Some(handle) = reader else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| String::from("output reader thread panicked"))?
        .map_err(|err| err.to_string())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
