//! Binary entry point for the `provision` CLI.

use std::env;
use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use provisioner::target::DEFAULT_SSH_CONFIG;
use provisioner::{
    CommandRunner, DEFAULT_HOST, ExecutionReport, Executor, ExecutorSettings, HostTarget,
    PlanError, ProcessCommandRunner, Profile, ProvisionConfig, ProvisionError, ProvisioningPlan,
    RenderedStep, SshSessionFactory, StreamingCommandRunner, preview,
};

mod cli;

use cli::{Cli, RunCommand, ShowCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("cannot determine working directory: {0}")]
    WorkingDirectory(String),
    #[error("failed to write output: {0}")]
    Output(String),
}

impl CliError {
    /// Remote exit status when a step reported one, otherwise 1.
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Provision(ProvisionError::CommandFailed {
                status: Some(code), ..
            }) if *code != 0 => *code,
            _ => 1,
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::Output(err.to_string())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .without_time()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Run(command) => run_command(&command),
        Cli::Show(command) => show_command(&command),
        Cli::List => {
            write_profiles(io::stdout())?;
            Ok(0)
        }
    }
}

fn run_command(args: &RunCommand) -> Result<i32, CliError> {
    let profile: Profile = args.profile.parse()?;
    let plan = profile.plan(&args.task)?;

    let config =
        ProvisionConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config.validate()?;

    let host = args.host.clone().unwrap_or_else(|| config.host.clone());
    let target = HostTarget::discover(host, &current_dir()?).with_shell(profile.shell());

    if args.dry_run {
        let rendered = preview(&target, &plan, &config.executor_settings());
        write_preview(io::stdout(), &rendered)?;
        return Ok(0);
    }

    let result = if args.quiet {
        execute(
            ProcessCommandRunner::with_timeout(config.step_timeout()),
            &config,
            &target,
            &plan,
        )
    } else {
        execute(
            StreamingCommandRunner::with_timeout(config.step_timeout()),
            &config,
            &target,
            &plan,
        )
    };

    match result {
        Ok(report) => {
            tracing::info!(
                plan = %report.plan,
                steps = report.steps.len(),
                "provisioning complete"
            );
            Ok(0)
        }
        Err(err) => {
            if args.quiet {
                write_captured(io::stderr(), &err);
            }
            Err(err.into())
        }
    }
}

fn execute<R: CommandRunner + Clone>(
    runner: R,
    config: &ProvisionConfig,
    target: &HostTarget,
    plan: &ProvisioningPlan,
) -> Result<ExecutionReport, ProvisionError> {
    let factory = SshSessionFactory::new(runner, config.ssh_settings());
    Executor::new(factory, config.executor_settings()).execute(target, plan)
}

fn show_command(args: &ShowCommand) -> Result<i32, CliError> {
    let profile: Profile = args.profile.parse()?;
    let plan = profile.plan(&args.task)?;
    let target = HostTarget::new(DEFAULT_HOST, DEFAULT_SSH_CONFIG).with_shell(profile.shell());
    let rendered = preview(&target, &plan, &ExecutorSettings::default());

    if args.json {
        write_json(
            io::stdout(),
            &PlanView {
                plan: &plan,
                commands: &rendered,
            },
        )?;
    } else {
        write_preview(io::stdout(), &rendered)?;
    }
    Ok(0)
}

#[derive(Serialize)]
struct PlanView<'a> {
    plan: &'a ProvisioningPlan,
    commands: &'a [RenderedStep],
}

fn current_dir() -> Result<Utf8PathBuf, CliError> {
    let cwd = env::current_dir().map_err(|err| CliError::WorkingDirectory(err.to_string()))?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|path| CliError::WorkingDirectory(format!("{} is not UTF-8", path.display())))
}

fn write_profiles(mut target: impl Write) -> io::Result<()> {
    for profile in Profile::ALL {
        writeln!(
            target,
            "{:<10} {:<6} {}",
            profile.name(),
            profile.tasks().join(","),
            profile.summary()
        )?;
    }
    Ok(())
}

fn write_preview(mut target: impl Write, steps: &[RenderedStep]) -> io::Result<()> {
    for step in steps {
        writeln!(target, "{:>2}. {}", step.index, step.command)?;
    }
    Ok(())
}

fn write_json(mut target: impl Write, view: &PlanView<'_>) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut target, view)
        .map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target)?;
    Ok(())
}

fn write_captured(mut target: impl Write, err: &ProvisionError) {
    let Some((stdout, stderr)) = err.captured_output() else {
        return;
    };
    if !stdout.is_empty() {
        writeln!(target, "--- remote stdout ---\n{}", stdout.trim_end()).ok();
    }
    if !stderr.is_empty() {
        writeln!(target, "--- remote stderr ---\n{}", stderr.trim_end()).ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}
