//! Dynamic configuration store layout.
//!
//! The proxy reads its routing rules from a key-value store. The harness does
//! not talk to the store itself; it describes the writes a run needs as a
//! [`ProxyLayout`] and hands them to any [`ConfigStore`] implementation.

use routeprobe_config::{Config, DEFAULT_STORE_ENDPOINT, DEFAULT_STORE_PREFIX, ServicePorts};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Failure reported by a store while writing a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to write {key}: {message}")]
pub struct StoreError {
    /// Key being written.
    pub key: String,
    /// Store-specific description.
    pub message: String,
}

/// Destination for configuration writes.
pub trait ConfigStore {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store rejects the write.
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Ordered in-memory store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: Vec<StoreEntry>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Current value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    /// Entries in first-write order.
    #[must_use]
    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }
}

impl ConfigStore for MemoryStore {
    fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => value.clone_into(&mut entry.value),
            None => self.entries.push(StoreEntry::new(key, value)),
        }
        Ok(())
    }
}

/// One key-value write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreEntry {
    /// Full key, including the prefix.
    pub key: String,
    /// Value written.
    pub value: String,
}

impl StoreEntry {
    fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// How the proxy reaches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Store address as `host:port`.
    pub endpoint: String,
    /// Key prefix the proxy watches.
    pub prefix: String,
    /// Host the proxy uses to reach the backends.
    pub backend_host: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STORE_ENDPOINT.to_owned(),
            prefix: DEFAULT_STORE_PREFIX.to_owned(),
            backend_host: "127.0.0.1".to_owned(),
        }
    }
}

impl StoreSettings {
    /// Settings taken from configuration. Backend URLs use the same host the
    /// backends are probed and bound on.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.store_endpoint.clone(),
            prefix: config.store_prefix.clone(),
            backend_host: config.backend_host.clone(),
        }
    }
}

/// A backend pool with a single weighted server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    /// Pool name.
    pub name: String,
    /// Server name inside the pool.
    pub server: String,
    /// Server URL.
    pub url: String,
    /// Load-balancing weight.
    pub weight: u32,
}

/// A frontend sending one path-prefix route to a backend pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendSpec {
    /// Frontend name.
    pub name: String,
    /// Pool served by this frontend.
    pub backend: String,
    /// Route name inside the frontend.
    pub route: String,
    /// Path prefix matched by the route.
    pub path_prefix: String,
}

/// Everything the proxy needs from the store for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyLayout {
    /// Store connection details.
    pub settings: StoreSettings,
    /// Debug mode flag.
    pub debug: bool,
    /// Entrypoint name.
    pub entrypoint: String,
    /// Entrypoint listen address, `:PORT`.
    pub entrypoint_address: String,
    /// Whether the API dashboard is enabled.
    pub dashboard: bool,
    /// Proxy log level.
    pub log_level: String,
    /// Backend pools.
    pub backends: Vec<BackendSpec>,
    /// Frontends.
    pub frontends: Vec<FrontendSpec>,
}

impl ProxyLayout {
    /// The three-backend layout: `/` to the default backend, `/user/first`
    /// and `/user/second` to their own backends.
    #[must_use]
    pub fn from_ports(ports: &ServicePorts, settings: &StoreSettings) -> Self {
        let pool = |name: &str, port: u16| BackendSpec {
            name: name.to_owned(),
            server: "server1".to_owned(),
            url: format!("http://{}:{port}", settings.backend_host),
            weight: 1,
        };
        let frontend = |name: &str, pool_name: &str, route: &str, path_prefix: &str| FrontendSpec {
            name: name.to_owned(),
            backend: pool_name.to_owned(),
            route: route.to_owned(),
            path_prefix: path_prefix.to_owned(),
        };
        Self {
            settings: settings.clone(),
            debug: true,
            entrypoint: "http".to_owned(),
            entrypoint_address: format!(":{}", ports.proxy),
            dashboard: true,
            log_level: "DEBUG".to_owned(),
            backends: vec![
                pool("defaultbackend", ports.default_backend),
                pool("userfirstbackend", ports.first_backend),
                pool("usersecondbackend", ports.second_backend),
            ],
            frontends: vec![
                frontend("default", "defaultbackend", "test_1", "/"),
                frontend("userfirst", "userfirstbackend", "test", "/user/first"),
                frontend("usersecond", "usersecondbackend", "test", "/user/second"),
            ],
        }
    }

    /// Key-value writes in the order the proxy expects them.
    #[must_use]
    pub fn entries(&self) -> Vec<StoreEntry> {
        let prefix = self.settings.prefix.trim_end_matches('/');
        let key = |suffix: &str| format!("{prefix}/{suffix}");
        let flag = |value: bool| value.to_string();

        let mut entries = vec![
            StoreEntry::new(key("debug"), flag(self.debug)),
            StoreEntry::new(key("defaultentrypoints/0"), self.entrypoint.as_str()),
            StoreEntry::new(
                key(&format!("entrypoints/{}/address", self.entrypoint)),
                self.entrypoint_address.as_str(),
            ),
            StoreEntry::new(key("api/dashboard"), flag(self.dashboard)),
            StoreEntry::new(key("api/entrypoint"), self.entrypoint.as_str()),
            StoreEntry::new(key("loglevel"), self.log_level.as_str()),
        ];
        for backend in &self.backends {
            let server = format!("backends/{}/servers/{}", backend.name, backend.server);
            entries.push(StoreEntry::new(key(&format!("{server}/url")), backend.url.as_str()));
            entries.push(StoreEntry::new(
                key(&format!("{server}/weight")),
                backend.weight.to_string(),
            ));
        }
        for frontend in &self.frontends {
            entries.push(StoreEntry::new(
                key(&format!("frontends/{}/backend", frontend.name)),
                frontend.backend.as_str(),
            ));
            entries.push(StoreEntry::new(
                key(&format!("frontends/{}/routes/{}/rule", frontend.name, frontend.route)),
                format!("PathPrefix:{}", frontend.path_prefix),
            ));
        }
        entries.extend([
            StoreEntry::new(key("etcd/endpoint"), self.settings.endpoint.as_str()),
            StoreEntry::new(key("etcd/prefix"), self.settings.prefix.as_str()),
            StoreEntry::new(key("etcd/useapiv3"), flag(true)),
            StoreEntry::new(key("etcd/watch"), flag(true)),
        ]);
        entries
    }

    /// Writes every entry to `store` in order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first [`StoreError`].
    pub fn populate(&self, store: &mut dyn ConfigStore) -> Result<usize, StoreError> {
        let entries = self.entries();
        for entry in &entries {
            store.put(&entry.key, &entry.value)?;
            debug!(
                target: "routeprobe::store",
                event = "store_put",
                key = %entry.key,
                "wrote configuration key"
            );
        }
        Ok(entries.len())
    }
}
