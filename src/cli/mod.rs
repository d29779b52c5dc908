//! Command-line interface definitions for the `provision` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `provision` binary.
#[derive(Debug, Parser)]
#[command(
    name = "provision",
    about = "Prepare a virtual machine over SSH by running a host profile",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Run a profile task against the host.
    #[command(name = "run", about = "Run a profile task against the host")]
    Run(RunCommand),
    /// Print the commands a profile task would send.
    #[command(name = "show", about = "Print the commands a profile task would send")]
    Show(ShowCommand),
    /// List the built-in profiles and their tasks.
    #[command(name = "list", about = "List the built-in profiles and their tasks")]
    List,
}

/// Arguments for the `provision run` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct RunCommand {
    /// Profile to apply (`freebsd10`, `ubuntu14` or `ubuntu16`).
    #[arg(value_name = "PROFILE")]
    pub(crate) profile: String,
    /// Task within the profile.
    #[arg(long, default_value = "all", value_name = "TASK")]
    pub(crate) task: String,
    /// Host alias from the SSH configuration file.
    ///
    /// Overrides `PROVISION_HOST` and `host` in `provision.toml`.
    #[arg(long, value_name = "HOST")]
    pub(crate) host: Option<String>,
    /// Print the rendered commands instead of connecting.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Capture remote output instead of streaming it; captured output is
    /// printed only when a step fails.
    #[arg(long, short)]
    pub(crate) quiet: bool,
}

/// Arguments for the `provision show` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ShowCommand {
    /// Profile to render.
    #[arg(value_name = "PROFILE")]
    pub(crate) profile: String,
    /// Task within the profile.
    #[arg(long, default_value = "all", value_name = "TASK")]
    pub(crate) task: String,
    /// Emit the plan as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}
