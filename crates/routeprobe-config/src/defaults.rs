//! Built-in defaults for the harness configuration.
//!
//! The port table mirrors the stock test topology: a proxy on 8000 routing to
//! a catch-all backend on 9000 and two user backends on 9090 and 9099.

use crate::logging::LogFormat;

/// Host the proxy and backends listen on.
pub const DEFAULT_HOST: &str = "localhost";

/// Port the proxy's HTTP entrypoint listens on.
pub const DEFAULT_PROXY_PORT: u16 = 8000;

/// Port of the catch-all backend.
pub const DEFAULT_BACKEND_PORT: u16 = 9000;

/// Port of the backend serving `/user/first`.
pub const FIRST_BACKEND_PORT: u16 = 9090;

/// Port of the backend serving `/user/second`.
pub const SECOND_BACKEND_PORT: u16 = 9099;

/// Provider name the proxy reports configuration status for.
pub const DEFAULT_STORE_KIND: &str = "etcdv3";

/// Address of the dynamic configuration store.
pub const DEFAULT_STORE_ENDPOINT: &str = "127.0.0.1:2379";

/// Key prefix the proxy watches in the store.
pub const DEFAULT_STORE_PREFIX: &str = "/traefik";

/// Per-attempt TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_000;

/// Number of TCP connect attempts before a service is declared not ready.
pub const DEFAULT_TCP_ATTEMPTS: u32 = 20;

/// Wait between failed TCP connect attempts.
pub const DEFAULT_TCP_INTERVAL_MS: u64 = 100;

/// Wall-clock budget for the proxy to load its dynamic configuration.
pub const DEFAULT_CONFIG_DEADLINE_MS: u64 = 10_000;

/// First wait after a failed configuration poll.
pub const DEFAULT_CONFIG_INITIAL_BACKOFF_MS: u64 = 100;

/// Ceiling for the configuration poll backoff.
pub const DEFAULT_CONFIG_MAX_BACKOFF_MS: u64 = 2_000;

/// Timeout applied to each HTTP probe request.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1_000;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binary.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

pub(crate) fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

pub(crate) fn default_store_kind() -> String {
    DEFAULT_STORE_KIND.to_owned()
}

pub(crate) fn default_store_endpoint() -> String {
    DEFAULT_STORE_ENDPOINT.to_owned()
}

pub(crate) fn default_store_prefix() -> String {
    DEFAULT_STORE_PREFIX.to_owned()
}

pub(crate) const fn default_proxy_port() -> u16 {
    DEFAULT_PROXY_PORT
}

pub(crate) const fn default_backend_port() -> u16 {
    DEFAULT_BACKEND_PORT
}

pub(crate) const fn first_backend_port() -> u16 {
    FIRST_BACKEND_PORT
}

pub(crate) const fn second_backend_port() -> u16 {
    SECOND_BACKEND_PORT
}

pub(crate) const fn connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

pub(crate) const fn tcp_attempts() -> u32 {
    DEFAULT_TCP_ATTEMPTS
}

pub(crate) const fn tcp_interval_ms() -> u64 {
    DEFAULT_TCP_INTERVAL_MS
}

pub(crate) const fn config_deadline_ms() -> u64 {
    DEFAULT_CONFIG_DEADLINE_MS
}

pub(crate) const fn config_initial_backoff_ms() -> u64 {
    DEFAULT_CONFIG_INITIAL_BACKOFF_MS
}

pub(crate) const fn config_max_backoff_ms() -> u64 {
    DEFAULT_CONFIG_MAX_BACKOFF_MS
}

pub(crate) const fn request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
