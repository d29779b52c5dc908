//! Turns plan steps into the command strings sent over SSH.
//!
//! The remote login shell may be `csh`, whose quoting rules differ from the
//! Bourne shell, so every step is wrapped as `<shell> '<script>'` with the
//! script passed as one single-quoted argument. Literal text inside the
//! script (directories, appended lines, file names) is quoted as well, so no
//! step relies on the login shell to concatenate strings.

use std::borrow::Cow;

use shell_escape::unix::escape;

use crate::plan::{ExecutionMode, Step, StepAction};

/// Shell prefix used when a profile does not override it.
pub const DEFAULT_SHELL: &str = "/bin/bash -l -c";

/// Escalation prefix used when configuration does not override it.
pub const DEFAULT_ESCALATION: &str = "sudo -n -H";

/// Renders the script for a step, before shell wrapping.
///
/// `dir` is the resolved working directory, if any. Globs must be resolved
/// by the caller; the value is quoted verbatim.
#[must_use]
pub fn step_script(action: &StepAction, dir: Option<&str>) -> String {
    let body = match action {
        StepAction::Run { command } => command.clone(),
        StepAction::AppendLine { file, line } => append_script(file, line),
    };

    match dir {
        Some(dir) => format!("cd {} && {body}", quote(dir)),
        None => body,
    }
}

/// Wraps a script in the remote shell and, for privileged steps, the
/// escalation prefix.
#[must_use]
pub fn wrap_script(script: &str, mode: ExecutionMode, shell: &str, escalation: &str) -> String {
    let wrapped = format!("{shell} {}", quote(script));
    match mode {
        ExecutionMode::Normal => wrapped,
        ExecutionMode::Privileged => format!("{escalation} {wrapped}"),
    }
}

/// Renders the full remote command for a step.
#[must_use]
pub fn remote_command(step: &Step, dir: Option<&str>, shell: &str, escalation: &str) -> String {
    wrap_script(&step_script(&step.action, dir), step.mode, shell, escalation)
}

/// Command that lists entries of `parent`, suffixing directories with `/`.
#[must_use]
pub fn listing_command(parent: &str) -> String {
    format!("ls -1p -- {}", quote(parent))
}

/// Returns `true` when stderr carries a refusal from the escalation program
/// itself rather than output of the escalated command.
///
/// The program is the first word of `escalation`; only lines it prefixes
/// with `<program>:` are considered.
#[must_use]
pub fn is_escalation_refusal(stderr: &str, escalation: &str) -> bool {
    const MARKERS: [&str; 7] = [
        "a password is required",
        "a terminal is required",
        "no tty present",
        "is not in the sudoers file",
        "is not allowed to",
        "Authorization required",
        "Operation not permitted",
    ];

    let Some(program) = escalation_program(escalation) else {
        return false;
    };
    let prefix = format!("{program}:");
    stderr
        .lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with(&prefix))
        .any(|line| MARKERS.iter().any(|marker| line.contains(marker)))
}

fn escalation_program(escalation: &str) -> Option<&str> {
    let first = escalation.split_whitespace().next()?;
    first.rsplit('/').next().filter(|name| !name.is_empty())
}

fn append_script(file: &str, line: &str) -> String {
    format!("printf '%s\\n' {} >> {}", quote(line), quote(file))
}

fn quote(text: &str) -> Cow<'_, str> {
    escape(Cow::Borrowed(text))
}
