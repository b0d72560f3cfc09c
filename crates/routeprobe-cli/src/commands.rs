//! Subcommand execution.
//!
//! Each command writes one line per result to `stdout`; progress and
//! diagnostics go through `tracing`.

use std::io::Write;

use routeprobe::{
    BlockingHttpClient, ConfigReadinessPoller, ExponentialBackoff, FixedInterval, ProxyLayout,
    ReadinessPoller, RouteTable, RoutingVerifier, StoreSettings, StubServer,
};
use routeprobe_config::{Config, Endpoint};
use tracing::info;

use crate::AppError;
use crate::cli::Command;

pub(crate) fn execute<W: Write>(
    command: &Command,
    config: &Config,
    stdout: &mut W,
) -> Result<(), AppError> {
    match command {
        Command::Wait => wait_for_services(config, stdout),
        Command::ConfigReady => wait_for_configuration(config, stdout),
        Command::Verify => verify_routes(config, stdout),
        Command::Check => {
            wait_for_services(config, stdout)?;
            wait_for_configuration(config, stdout)?;
            verify_routes(config, stdout)
        }
        Command::Layout => print_layout(config, stdout),
        Command::StubBackend { port, host } => {
            let bind_host = host.as_deref().unwrap_or(&config.backend_host);
            serve_backend(bind_host, *port, stdout)
        }
    }
}

/// Waits for the backends concurrently, then for the proxy.
fn wait_for_services<W: Write>(config: &Config, stdout: &mut W) -> Result<(), AppError> {
    let policy = FixedInterval::new(config.tcp_attempts, config.tcp_interval())?;
    let poller = ReadinessPoller::new().with_connect_timeout(config.connect_timeout());

    let backends = config.backend_endpoints()?;
    let pending = poller.await_all_ready(&backends, &policy)?;
    if !pending.is_empty() {
        return Err(not_ready(&pending));
    }
    for backend in &backends {
        writeln!(stdout, "ready {backend}")?;
    }

    let proxy = config.proxy_endpoint()?;
    if !poller.await_ready(&proxy, &policy)? {
        return Err(not_ready(std::slice::from_ref(&proxy)));
    }
    writeln!(stdout, "ready {proxy}")?;
    Ok(())
}

fn not_ready(endpoints: &[Endpoint]) -> AppError {
    AppError::NotReady {
        endpoints: endpoints.iter().map(ToString::to_string).collect(),
    }
}

fn wait_for_configuration<W: Write>(config: &Config, stdout: &mut W) -> Result<(), AppError> {
    let policy = ExponentialBackoff::new(
        config.config_deadline(),
        config.config_initial_backoff(),
        config.config_max_backoff(),
    )?;
    let proxy = config.proxy_endpoint()?;
    let ready = ConfigReadinessPoller::new(policy)?
        .with_store_kind(config.store_kind())
        .with_request_timeout(config.request_timeout())
        .await_config_ready(&proxy)?;
    writeln!(
        stdout,
        "configuration ready after {} attempt(s) in {} ms",
        ready.attempts,
        ready.elapsed.as_millis()
    )?;
    Ok(())
}

fn verify_routes<W: Write>(config: &Config, stdout: &mut W) -> Result<(), AppError> {
    let table = RouteTable::from_config(config)?;
    let proxy = config.proxy_endpoint()?;
    let verifier = RoutingVerifier::new(BlockingHttpClient::new()?)
        .with_request_timeout(config.request_timeout());
    let verified = verifier.verify_routes(&proxy, &table)?;
    writeln!(stdout, "verified {} route(s)", verified.checked)?;
    Ok(())
}

/// Prints the store writes as JSON lines, in write order.
fn print_layout<W: Write>(config: &Config, stdout: &mut W) -> Result<(), AppError> {
    let layout = ProxyLayout::from_ports(&config.service_ports(), &StoreSettings::from_config(config));
    for entry in layout.entries() {
        serde_json::to_writer(&mut *stdout, &entry).map_err(AppError::SerialiseLayout)?;
        writeln!(stdout)?;
    }
    Ok(())
}

/// Serves until the process is killed.
fn serve_backend<W: Write>(host: &str, port: u16, stdout: &mut W) -> Result<(), AppError> {
    let server = StubServer::backend(host, port)?;
    writeln!(stdout, "listening {}", server.local_addr())?;
    stdout.flush()?;
    info!(
        target: "routeprobe::cli",
        event = "stub_backend_started",
        address = %server.local_addr(),
        "backend stub serving until terminated"
    );
    server.join()?;
    Ok(())
}
