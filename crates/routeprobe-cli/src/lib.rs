//! Command-line interface for the routeprobe harness.
//!
//! The binary waits for a proxy and its backends, waits for the proxy to load
//! its dynamic configuration, and verifies path routing. Exit codes are `0`
//! on success, `1` when a check fails and `2` for usage errors.

mod cli;
mod commands;
mod config;
mod errors;
mod telemetry;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;
use crate::config::{ConfigLoader, OrthoConfigLoader, command_arguments, split_config_arguments};
pub(crate) use crate::errors::AppError;

/// Flags consumed by the configuration layer when they precede the command.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--proxy-host",
    "--proxy-port",
    "--backend-host",
    "--default-backend-port",
    "--first-backend-port",
    "--second-backend-port",
    "--store-kind",
    "--store-endpoint",
    "--store-prefix",
    "--connect-timeout-ms",
    "--tcp-attempts",
    "--tcp-interval-ms",
    "--config-deadline-ms",
    "--config-initial-backoff-ms",
    "--config-max-backoff-ms",
    "--request-timeout-ms",
    "--routes",
];

const USAGE_EXIT: u8 = 2;

/// Runs the CLI with the provided arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(command_arguments(&args, &split)) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };

    let result = loader.load(&split.config_arguments).and_then(|config| {
        telemetry::initialise(&config)?;
        commands::execute(&cli.command, &config, stdout)
    });
    match result {
        Ok(()) => {
            let _ = stdout.flush();
            ExitCode::SUCCESS
        }
        Err(error) => {
            let _ = stdout.flush();
            let _ = writeln!(stderr, "routeprobe: {error}");
            ExitCode::FAILURE
        }
    }
}

/// Help and version go to stdout and succeed; anything else is a usage error.
fn report_usage<W: Write, E: Write>(error: &clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode {
    let rendered = error.render().to_string();
    if error.use_stderr() {
        let _ = write!(stderr, "{rendered}");
        ExitCode::from(USAGE_EXIT)
    } else {
        let _ = write!(stdout, "{rendered}");
        ExitCode::SUCCESS
    }
}
