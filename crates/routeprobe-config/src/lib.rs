//! Shared configuration for the routeprobe harness.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional configuration file (`--config-path` or `ROUTEPROBE_CONFIG_PATH`),
//! then `ROUTEPROBE_*` environment variables, then command-line flags. The
//! resolved [`Config`] only carries plain values; the core crate turns them
//! into retry policies and route tables.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod endpoint;
mod logging;
mod services;

pub use defaults::{
    DEFAULT_BACKEND_PORT, DEFAULT_CONFIG_DEADLINE_MS, DEFAULT_CONFIG_INITIAL_BACKOFF_MS,
    DEFAULT_CONFIG_MAX_BACKOFF_MS, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HOST, DEFAULT_LOG_FILTER,
    DEFAULT_PROXY_PORT, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_STORE_ENDPOINT, DEFAULT_STORE_KIND,
    DEFAULT_STORE_PREFIX, DEFAULT_TCP_ATTEMPTS, DEFAULT_TCP_INTERVAL_MS, FIRST_BACKEND_PORT,
    SECOND_BACKEND_PORT, default_log_filter, default_log_filter_string, default_log_format,
};
pub use endpoint::{Endpoint, EndpointError};
pub use logging::{LogFormat, LogFormatParseError};
pub use services::ServicePorts;

/// Resolved harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "ROUTEPROBE")]
pub struct Config {
    /// Host the proxy listens on.
    #[serde(default = "defaults::default_host")]
    #[ortho_config(default = crate::defaults::default_host())]
    pub proxy_host: String,
    /// Port of the proxy's HTTP entrypoint.
    #[serde(default = "defaults::default_proxy_port")]
    #[ortho_config(default = crate::DEFAULT_PROXY_PORT)]
    pub proxy_port: u16,
    /// Host the backend stubs listen on.
    #[serde(default = "defaults::default_host")]
    #[ortho_config(default = crate::defaults::default_host())]
    pub backend_host: String,
    /// Port of the catch-all backend.
    #[serde(default = "defaults::default_backend_port")]
    #[ortho_config(default = crate::DEFAULT_BACKEND_PORT)]
    pub default_backend_port: u16,
    /// Port of the `/user/first` backend.
    #[serde(default = "defaults::first_backend_port")]
    #[ortho_config(default = crate::FIRST_BACKEND_PORT)]
    pub first_backend_port: u16,
    /// Port of the `/user/second` backend.
    #[serde(default = "defaults::second_backend_port")]
    #[ortho_config(default = crate::SECOND_BACKEND_PORT)]
    pub second_backend_port: u16,
    /// Provider name polled at `/api/providers/{store_kind}`.
    #[serde(default = "defaults::default_store_kind")]
    #[ortho_config(default = crate::defaults::default_store_kind())]
    pub store_kind: String,
    /// Address of the dynamic configuration store, written into the layout.
    #[serde(default = "defaults::default_store_endpoint")]
    #[ortho_config(default = crate::defaults::default_store_endpoint())]
    pub store_endpoint: String,
    /// Key prefix the proxy watches in the store.
    #[serde(default = "defaults::default_store_prefix")]
    #[ortho_config(default = crate::defaults::default_store_prefix())]
    pub store_prefix: String,
    /// Per-attempt TCP connect timeout in milliseconds.
    #[serde(default = "defaults::connect_timeout_ms")]
    #[ortho_config(default = crate::DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// TCP connect attempts before a service is declared not ready.
    #[serde(default = "defaults::tcp_attempts")]
    #[ortho_config(default = crate::DEFAULT_TCP_ATTEMPTS)]
    pub tcp_attempts: u32,
    /// Wait between failed TCP attempts in milliseconds.
    #[serde(default = "defaults::tcp_interval_ms")]
    #[ortho_config(default = crate::DEFAULT_TCP_INTERVAL_MS)]
    pub tcp_interval_ms: u64,
    /// Budget for configuration readiness in milliseconds.
    #[serde(default = "defaults::config_deadline_ms")]
    #[ortho_config(default = crate::DEFAULT_CONFIG_DEADLINE_MS)]
    pub config_deadline_ms: u64,
    /// First backoff after a failed configuration poll in milliseconds.
    #[serde(default = "defaults::config_initial_backoff_ms")]
    #[ortho_config(default = crate::DEFAULT_CONFIG_INITIAL_BACKOFF_MS)]
    pub config_initial_backoff_ms: u64,
    /// Backoff ceiling for configuration polls in milliseconds.
    #[serde(default = "defaults::config_max_backoff_ms")]
    #[ortho_config(default = crate::DEFAULT_CONFIG_MAX_BACKOFF_MS)]
    pub config_max_backoff_ms: u64,
    /// Timeout for each HTTP probe in milliseconds.
    #[serde(default = "defaults::request_timeout_ms")]
    #[ortho_config(default = crate::DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
    /// Route expectations as `PATH=PORT`; empty selects the built-in table.
    #[serde(default)]
    #[ortho_config(default = Vec::new())]
    pub routes: Vec<String>,
    /// Tracing filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    #[ortho_config(default = crate::default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    #[ortho_config(default = crate::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy_host: defaults::default_host(),
            proxy_port: DEFAULT_PROXY_PORT,
            backend_host: defaults::default_host(),
            default_backend_port: DEFAULT_BACKEND_PORT,
            first_backend_port: FIRST_BACKEND_PORT,
            second_backend_port: SECOND_BACKEND_PORT,
            store_kind: defaults::default_store_kind(),
            store_endpoint: defaults::default_store_endpoint(),
            store_prefix: defaults::default_store_prefix(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            tcp_attempts: DEFAULT_TCP_ATTEMPTS,
            tcp_interval_ms: DEFAULT_TCP_INTERVAL_MS,
            config_deadline_ms: DEFAULT_CONFIG_DEADLINE_MS,
            config_initial_backoff_ms: DEFAULT_CONFIG_INITIAL_BACKOFF_MS,
            config_max_backoff_ms: DEFAULT_CONFIG_MAX_BACKOFF_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            routes: Vec::new(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Port assignments for the proxy and the three backends.
    #[must_use]
    pub const fn service_ports(&self) -> ServicePorts {
        ServicePorts {
            proxy: self.proxy_port,
            default_backend: self.default_backend_port,
            first_backend: self.first_backend_port,
            second_backend: self.second_backend_port,
        }
    }

    /// Endpoint of the proxy's HTTP entrypoint.
    pub fn proxy_endpoint(&self) -> Result<Endpoint, EndpointError> {
        Endpoint::new(self.proxy_host.as_str(), self.proxy_port)
    }

    /// Endpoints of the backends in launch order.
    pub fn backend_endpoints(&self) -> Result<Vec<Endpoint>, EndpointError> {
        self.service_ports()
            .backends()
            .into_iter()
            .map(|port| Endpoint::new(self.backend_host.as_str(), port))
            .collect()
    }

    /// Per-attempt TCP connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Wait between failed TCP attempts.
    #[must_use]
    pub const fn tcp_interval(&self) -> Duration {
        Duration::from_millis(self.tcp_interval_ms)
    }

    /// Budget for configuration readiness.
    #[must_use]
    pub const fn config_deadline(&self) -> Duration {
        Duration::from_millis(self.config_deadline_ms)
    }

    /// First backoff after a failed configuration poll.
    #[must_use]
    pub const fn config_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.config_initial_backoff_ms)
    }

    /// Backoff ceiling for configuration polls.
    #[must_use]
    pub const fn config_max_backoff(&self) -> Duration {
        Duration::from_millis(self.config_max_backoff_ms)
    }

    /// Timeout for each HTTP probe.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Provider name polled for configuration status.
    #[must_use]
    pub fn store_kind(&self) -> &str {
        &self.store_kind
    }

    /// Route expectations in `PATH=PORT` form.
    #[must_use]
    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_match_stock_topology() {
        let config = Config::default();
        assert_eq!(
            config.service_ports(),
            ServicePorts {
                proxy: 8000,
                default_backend: 9000,
                first_backend: 9090,
                second_backend: 9099,
            }
        );
    }

    #[test]
    fn backend_endpoints_follow_launch_order() {
        let config = Config {
            backend_host: String::from("127.0.0.1"),
            ..Config::default()
        };
        let endpoints = config.backend_endpoints().expect("valid endpoints");
        let rendered: Vec<String> = endpoints.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            ["127.0.0.1:9000", "127.0.0.1:9090", "127.0.0.1:9099"]
        );
    }

    #[test]
    fn proxy_endpoint_rejects_port_zero() {
        let config = Config {
            proxy_port: 0,
            ..Config::default()
        };
        assert!(config.proxy_endpoint().is_err());
    }

    #[test]
    fn durations_are_derived_from_milliseconds() {
        let config = Config::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
        assert_eq!(config.tcp_interval(), Duration::from_millis(100));
        assert_eq!(config.config_deadline(), Duration::from_secs(10));
        assert_eq!(config.config_initial_backoff(), Duration::from_millis(100));
        assert_eq!(config.config_max_backoff(), Duration::from_secs(2));
    }
}
