//! Path-prefix routing verification.
//!
//! Every backend answers any request with its own listening port, so the body
//! of a response fetched through the proxy names the backend that served it.
//! The verifier sends one request per expectation and compares that identity
//! with the expected one. It never evaluates prefix rules itself; the proxy's
//! decision is observed as a black box.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use routeprobe_config::{Config, Endpoint, ServicePorts};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::http::HttpProbe;

/// Identity of a backend: the decimal port it listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BackendId(u16);

impl BackendId {
    /// Wraps a backend port.
    #[must_use]
    pub const fn new(port: u16) -> Self {
        Self(port)
    }

    /// Port number backing this identity.
    #[must_use]
    pub const fn port(self) -> u16 {
        self.0
    }
}

impl From<u16> for BackendId {
    fn from(port: u16) -> Self {
        Self(port)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request path and the backend expected to serve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteExpectation {
    /// Path sent to the proxy.
    pub path_prefix: String,
    /// Backend that should answer.
    pub expected_backend: BackendId,
}

impl RouteExpectation {
    /// Builds an expectation.
    #[must_use]
    pub fn new(path_prefix: impl Into<String>, expected_backend: u16) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            expected_backend: BackendId(expected_backend),
        }
    }
}

impl fmt::Display for RouteExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.path_prefix, self.expected_backend)
    }
}

/// Invalid `PATH=PORT` route expectation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteParseError {
    /// No `=` separator.
    #[error("route '{input}' must have the form PATH=PORT")]
    MissingSeparator {
        /// Rejected input.
        input: String,
    },
    /// Nothing before the separator.
    #[error("route '{input}' has an empty path")]
    EmptyPath {
        /// Rejected input.
        input: String,
    },
    /// The backend is not a port number.
    #[error("route '{input}' has an invalid backend port: {source}")]
    InvalidPort {
        /// Rejected input.
        input: String,
        /// Integer parse failure.
        #[source]
        source: std::num::ParseIntError,
    },
    /// Port zero never identifies a listening backend.
    #[error("route '{input}' names backend port 0")]
    ZeroPort {
        /// Rejected input.
        input: String,
    },
}

impl FromStr for RouteExpectation {
    type Err = RouteParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (raw_path, raw_port) = input.rsplit_once('=').ok_or_else(|| {
            RouteParseError::MissingSeparator {
                input: input.to_owned(),
            }
        })?;
        let path = raw_path.trim();
        if path.is_empty() {
            return Err(RouteParseError::EmptyPath {
                input: input.to_owned(),
            });
        }
        let port: u16 = raw_port
            .trim()
            .parse()
            .map_err(|source| RouteParseError::InvalidPort {
                input: input.to_owned(),
                source,
            })?;
        if port == 0 {
            return Err(RouteParseError::ZeroPort {
                input: input.to_owned(),
            });
        }
        Ok(Self::new(path, port))
    }
}

/// Ordered list of route expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: Vec<RouteExpectation>,
}

impl RouteTable {
    /// Wraps an ordered list of expectations.
    #[must_use]
    pub const fn new(routes: Vec<RouteExpectation>) -> Self {
        Self { routes }
    }

    /// The standard three-backend scenario.
    ///
    /// `/user/first` and `/user/second` go to their own backends and every
    /// other path falls through to the default backend, including paths that
    /// only share a parent segment with a routed prefix.
    #[must_use]
    pub fn default_for(ports: &ServicePorts) -> Self {
        Self::new(vec![
            RouteExpectation::new("/otherthings", ports.default_backend),
            RouteExpectation::new("/user/somebody", ports.default_backend),
            RouteExpectation::new("/user/first", ports.first_backend),
            RouteExpectation::new("/user/second", ports.second_backend),
            RouteExpectation::new("/user/first/otherthings", ports.first_backend),
            RouteExpectation::new("/user/second/otherthings", ports.second_backend),
        ])
    }

    /// Table from configuration: the configured routes, or the standard
    /// scenario for the configured ports when none are given.
    ///
    /// # Errors
    ///
    /// Returns [`RouteParseError`] for the first malformed route.
    pub fn from_config(config: &Config) -> Result<Self, RouteParseError> {
        if config.routes().is_empty() {
            return Ok(Self::default_for(&config.service_ports()));
        }
        config.routes().iter().map(|route| route.parse()).collect()
    }

    /// Number of expectations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Expectations in verification order.
    pub fn iter(&self) -> std::slice::Iter<'_, RouteExpectation> {
        self.routes.iter()
    }
}

impl FromIterator<RouteExpectation> for RouteTable {
    fn from_iter<I: IntoIterator<Item = RouteExpectation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a RouteExpectation;
    type IntoIter = std::slice::Iter<'a, RouteExpectation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// All expectations held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutesVerified {
    /// Expectations checked.
    pub checked: usize,
}

/// What was observed instead of the expected backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteFailureKind {
    /// A different backend answered.
    Mismatch {
        /// Backend that answered.
        observed: BackendId,
    },
    /// The proxy answered with a non-2xx status.
    Status {
        /// Status received.
        status: u16,
        /// Body received.
        body: String,
    },
    /// The body does not name a backend.
    MalformedBody {
        /// Body received.
        body: String,
    },
    /// No response was received.
    Transport {
        /// Client error.
        message: String,
    },
}

impl fmt::Display for RouteFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { observed } => write!(f, "backend {observed} answered"),
            Self::Status { status, body } => write!(f, "status {status} with body {body:?}"),
            Self::MalformedBody { body } => write!(f, "body {body:?} is not a backend port"),
            Self::Transport { message } => write!(f, "request failed: {message}"),
        }
    }
}

/// First expectation that did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route {path} expected backend {expected}, but {kind}")]
pub struct RouteFailure {
    /// Zero-based position in the table.
    pub index: usize,
    /// Path that was requested.
    pub path: String,
    /// Backend the table expects.
    pub expected: BackendId,
    /// What was observed.
    pub kind: RouteFailureKind,
}

/// Checks that the proxy sends each path to its expected backend.
#[derive(Debug, Clone)]
pub struct RoutingVerifier<H> {
    http: H,
    request_timeout: Duration,
}

impl<H> RoutingVerifier<H>
where
    H: HttpProbe,
{
    /// Creates a verifier issuing requests through `http`.
    pub const fn new(http: H) -> Self {
        Self {
            http,
            request_timeout: Duration::from_secs(1),
        }
    }

    /// Replaces the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Requests every path in `routes` through `proxy`, in order, and stops at
    /// the first one not served by its expected backend.
    ///
    /// No request is retried; the verifier keeps no state between calls.
    ///
    /// # Errors
    ///
    /// Returns the first [`RouteFailure`].
    pub fn verify_routes(
        &self,
        proxy: &Endpoint,
        routes: &RouteTable,
    ) -> Result<RoutesVerified, RouteFailure> {
        for (index, route) in routes.iter().enumerate() {
            if let Err(kind) = self.check(proxy, route) {
                let failure = RouteFailure {
                    index,
                    path: route.path_prefix.clone(),
                    expected: route.expected_backend,
                    kind,
                };
                warn!(
                    target: "routeprobe::routing",
                    event = "route_failed",
                    index,
                    path = %failure.path,
                    expected = %failure.expected,
                    observation = %failure.kind,
                    "route not served by expected backend"
                );
                return Err(failure);
            }
            debug!(
                target: "routeprobe::routing",
                event = "route_ok",
                index,
                path = %route.path_prefix,
                backend = %route.expected_backend,
                "route served by expected backend"
            );
        }
        info!(
            target: "routeprobe::routing",
            event = "routes_verified",
            checked = routes.len(),
            "all routes served by their expected backends"
        );
        Ok(RoutesVerified {
            checked: routes.len(),
        })
    }

    fn check(&self, proxy: &Endpoint, route: &RouteExpectation) -> Result<(), RouteFailureKind> {
        let url = proxy.http_url(&route.path_prefix);
        let response = self
            .http
            .get(&url, self.request_timeout)
            .map_err(|error| RouteFailureKind::Transport {
                message: error.to_string(),
            })?;
        if !response.is_success() {
            return Err(RouteFailureKind::Status {
                status: response.status,
                body: response.body,
            });
        }
        let observed = parse_backend(&response.body)
            .ok_or_else(|| RouteFailureKind::MalformedBody {
                body: response.body.clone(),
            })?;
        if observed == route.expected_backend {
            Ok(())
        } else {
            Err(RouteFailureKind::Mismatch { observed })
        }
    }
}

fn parse_backend(body: &str) -> Option<BackendId> {
    body.trim().parse::<u16>().ok().map(BackendId)
}
