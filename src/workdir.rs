//! Resolve-one-match working directories.
//!
//! Remote shells disagree on glob expansion (`csh` aborts on no match,
//! `sh` passes the pattern through), so glob working directories are
//! matched locally against a directory listing fetched from the host.

use glob::{MatchOptions, Pattern};
use thiserror::Error;

/// Errors raised while resolving a glob to a single directory.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WorkDirError {
    /// Raised when the glob cannot be compiled.
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Pattern that failed to compile.
        pattern: String,
        /// Parser message from the glob compiler.
        message: String,
    },
    /// Raised when the pattern matches zero or several directories.
    #[error("pattern {pattern:?} matched {} directories: {matches:?}", matches.len())]
    Ambiguous {
        /// Pattern that was resolved.
        pattern: String,
        /// Directories that matched, possibly none.
        matches: Vec<String>,
    },
}

/// Splits a glob into the directory to list and the final component to
/// match. Only the final component may contain wildcards.
#[must_use]
pub fn split_pattern(pattern: &str) -> (&str, &str) {
    match pattern.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((parent, name)) => (parent, name),
        None => (".", pattern),
    }
}

/// Extracts directory names from `ls -1p` output, where directories carry a
/// trailing `/`.
#[must_use]
pub fn parse_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.strip_suffix('/'))
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_owned)
        .collect()
}

/// Resolves `pattern` against the directory names found in its parent.
///
/// The returned path keeps the parent prefix from the pattern, so
/// `build/ImageMagick-*` resolves to `build/ImageMagick-6.9.8-10`.
///
/// # Errors
///
/// Returns [`WorkDirError::Ambiguous`] unless exactly one directory matches,
/// or [`WorkDirError::InvalidPattern`] when the final component is not a
/// valid glob.
pub fn resolve_one(pattern: &str, directories: &[String]) -> Result<String, WorkDirError> {
    let (parent, name) = split_pattern(pattern);
    let compiled = Pattern::new(name).map_err(|err| WorkDirError::InvalidPattern {
        pattern: pattern.to_owned(),
        message: err.msg.to_owned(),
    })?;
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut matches: Vec<String> = directories
        .iter()
        .filter(|dir| compiled.matches_with(dir, options))
        .map(|dir| join(parent, dir))
        .collect();

    if matches.len() == 1
        && let Some(found) = matches.pop()
    {
        return Ok(found);
    }

    matches.sort();
    Err(WorkDirError::Ambiguous {
        pattern: pattern.to_owned(),
        matches,
    })
}

fn join(parent: &str, name: &str) -> String {
    match parent {
        "." => name.to_owned(),
        "/" => format!("/{name}"),
        _ => format!("{parent}/{name}"),
    }
}
