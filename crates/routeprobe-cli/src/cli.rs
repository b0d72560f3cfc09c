//! CLI argument definitions for the routeprobe harness.
//!
//! Shared by the runtime parser and the build script that renders the manual
//! page. Configuration flags are not declared here; they are split off before
//! parsing and handed to the configuration loader.

use clap::{Parser, Subcommand};

/// Readiness polling and routing verification for a path-routing proxy.
#[derive(Parser, Debug)]
#[command(name = "routeprobe", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Harness step to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Harness steps.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Waits until every backend and then the proxy accept TCP connections.
    Wait,
    /// Waits until the proxy reports its dynamic configuration as loaded.
    ConfigReady,
    /// Checks that each route is served by its expected backend.
    Verify,
    /// Runs `wait`, `config-ready` and `verify` in order.
    Check,
    /// Prints the dynamic store writes for the configured ports as JSON lines.
    Layout,
    /// Serves a backend that answers every request with its own port.
    StubBackend {
        /// Port to listen on.
        #[arg(long)]
        port: u16,
        /// Address to bind; defaults to the configured backend host.
        #[arg(long)]
        host: Option<String>,
    },
}
