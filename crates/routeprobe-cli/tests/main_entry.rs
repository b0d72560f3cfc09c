//! Integration tests for the `routeprobe` binary entry point.
//!
//! Covers exit codes and the configuration layers as seen from the process
//! boundary: flags, `ROUTEPROBE_*` variables and configuration files.

#![expect(
    clippy::expect_used,
    reason = "test code uses expect for clarity and assertions"
)]

use std::fs;
use std::net::TcpListener;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

/// Runs the binary from an empty directory so no stray configuration file
/// is discovered.
fn routeprobe(workdir: &TempDir) -> Command {
    let mut command = cargo_bin_cmd!("routeprobe");
    command.current_dir(workdir.path());
    command.env_remove("ROUTEPROBE_PROXY_PORT");
    command.env_remove("ROUTEPROBE_CONFIG_PATH");
    command
}

fn workdir() -> TempDir {
    TempDir::new().expect("create temporary directory")
}

#[test]
fn help_succeeds() {
    let dir = workdir();
    routeprobe(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("config-ready"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let dir = workdir();
    routeprobe(&dir).assert().code(2);
}

#[test]
fn layout_prints_json_lines() {
    let dir = workdir();
    routeprobe(&dir)
        .arg("layout")
        .assert()
        .success()
        .stdout(contains(r#"{"key":"/traefik/entrypoints/http/address","value":":8000"}"#));
}

#[test]
fn configuration_flags_precede_the_subcommand() {
    let dir = workdir();
    routeprobe(&dir)
        .args(["--proxy-port", "18000", "layout"])
        .assert()
        .success()
        .stdout(contains(r#""value":":18000""#));
}

#[test]
fn environment_overrides_defaults() {
    let dir = workdir();
    routeprobe(&dir)
        .env("ROUTEPROBE_PROXY_PORT", "18001")
        .arg("layout")
        .assert()
        .success()
        .stdout(contains(r#""value":":18001""#));
}

#[test]
fn configuration_file_is_honoured() -> anyhow::Result<()> {
    let dir = workdir();
    let path = dir.path().join("routeprobe.toml");
    fs::write(&path, "proxy_port = 18002\nstore_prefix = \"/edge\"\n")?;

    routeprobe(&dir)
        .arg("--config-path")
        .arg(&path)
        .arg("layout")
        .assert()
        .success()
        .stdout(contains(r#"{"key":"/edge/entrypoints/http/address","value":":18002"}"#));
    Ok(())
}

#[test]
fn wait_fails_when_nothing_listens() {
    let dir = workdir();
    let port = {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        listener.local_addr().expect("local addr").port()
    };
    routeprobe(&dir)
        .args([
            "--backend-host",
            "127.0.0.1",
            "--default-backend-port",
            &port.to_string(),
            "--tcp-attempts",
            "2",
            "--tcp-interval-ms",
            "10",
            "wait",
        ])
        .assert()
        .code(1)
        .stderr(contains("not ready"));
}

#[test]
fn stub_backend_fails_on_an_occupied_port() {
    let dir = workdir();
    let occupied = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let port = occupied.local_addr().expect("local addr").port();
    routeprobe(&dir)
        .args(["stub-backend", "--host", "127.0.0.1", "--port", &port.to_string()])
        .assert()
        .code(1)
        .stderr(contains("failed to bind"));
}
