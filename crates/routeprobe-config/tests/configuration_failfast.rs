//! Configuration values the harness cannot use are rejected at load time.

#![expect(
    clippy::expect_used,
    reason = "test code uses expect for clarity and assertions"
)]

use std::ffi::OsString;
use std::fs;

use ortho_config::OrthoConfig;
use rstest::rstest;
use tempfile::TempDir;

use routeprobe_config::{Config, LogFormat};

fn load_file(contents: &str) -> Result<Config, String> {
    let temp_dir = TempDir::new().expect("create temp dir");
    let path = temp_dir.path().join("routeprobe.toml");
    fs::write(&path, contents).expect("write config");
    let args = [
        OsString::from("routeprobe"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];
    Config::load_from_iter(args).map_err(|error| error.to_string())
}

#[rstest]
#[case::port_above_range("proxy_port = 70000\n")]
#[case::negative_attempts("tcp_attempts = -1\n")]
#[case::unknown_log_format("log_format = \"pretty\"\n")]
#[case::routes_not_a_list("routes = \"/user/first=9090\"\n")]
fn unusable_values_fail_to_load(#[case] contents: &str) {
    assert!(
        load_file(contents).is_err(),
        "{contents:?} must not load"
    );
}

#[test]
fn malformed_toml_names_the_file() {
    let error = load_file("proxy_port = 8000 tcp_attempts = 3").expect_err("syntax error");
    assert!(error.contains("routeprobe.toml"), "got {error}");
}

#[test]
fn missing_explicit_file_is_an_error() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let args = [
        OsString::from("routeprobe"),
        OsString::from("--config-path"),
        temp_dir.path().join("absent.toml").into_os_string(),
    ];
    assert!(Config::load_from_iter(args).is_err());
}

#[test]
fn well_formed_file_loads_routes_and_format() {
    let config = load_file(
        "routes = [\"/user/first=9090\", \"/=9000\"]\nlog_format = \"json\"\n",
    )
    .expect("valid configuration");

    assert_eq!(config.routes(), ["/user/first=9090", "/=9000"]);
    assert_eq!(config.log_format(), LogFormat::Json);
}
