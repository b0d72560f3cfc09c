//! Configuration readiness polling.
//!
//! Accepting TCP connections only means the proxy process is up. It serves
//! traffic according to the dynamic store once its provider status endpoint
//! answers `200 OK`; until then the endpoint is polled with exponential
//! backoff inside a fixed deadline.

use std::time::Duration;

use routeprobe_config::{DEFAULT_STORE_KIND, Endpoint};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::http::{BlockingHttpClient, ClientBuildError, HttpProbe, HttpProbeError};
use crate::retry::{Attempt, ExponentialBackoff, ProbeOutcome, RetryOutcome, RetryPolicy, retry};

/// Default timeout for a single status request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Successful configuration readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigReady {
    /// Requests made, including the successful one.
    pub attempts: u32,
    /// Time from the first request to success.
    pub elapsed: Duration,
}

/// Failure of a configuration readiness poll.
#[derive(Debug, Error)]
pub enum ConfigReadinessError {
    /// The HTTP client could not be constructed.
    #[error(transparent)]
    Client(#[from] ClientBuildError),
    /// The status request cannot be issued at all.
    #[error("cannot poll configuration status: {source}")]
    Request {
        /// Underlying probe error.
        #[source]
        source: HttpProbeError,
    },
    /// The deadline passed without a `200 OK`.
    #[error(
        "configuration not ready at {url} after {attempts} attempts in {elapsed:?}{}",
        last_observation(.last)
    )]
    NotReady {
        /// Status URL that was polled.
        url: String,
        /// Requests made.
        attempts: u32,
        /// Time spent polling.
        elapsed: Duration,
        /// Last observation before the deadline.
        last: Option<String>,
    },
}

fn last_observation(last: &Option<String>) -> String {
    last.as_deref()
        .map(|reason| format!(" (last: {reason})"))
        .unwrap_or_default()
}

/// Polls the proxy's provider status endpoint until it reports `200 OK`.
#[derive(Debug, Clone)]
pub struct ConfigReadinessPoller<H = BlockingHttpClient, C = SystemClock> {
    http: H,
    clock: C,
    policy: ExponentialBackoff,
    store_kind: String,
    request_timeout: Duration,
}

impl ConfigReadinessPoller<BlockingHttpClient, SystemClock> {
    /// Creates a poller with a blocking HTTP client on the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigReadinessError::Client`] when the HTTP client cannot be
    /// built.
    pub fn new(policy: ExponentialBackoff) -> Result<Self, ConfigReadinessError> {
        Ok(Self::with_parts(BlockingHttpClient::new()?, SystemClock, policy))
    }
}

impl<H, C> ConfigReadinessPoller<H, C>
where
    H: HttpProbe,
    C: Clock,
{
    /// Creates a poller from explicit collaborators.
    pub fn with_parts(http: H, clock: C, policy: ExponentialBackoff) -> Self {
        Self {
            http,
            clock,
            policy,
            store_kind: DEFAULT_STORE_KIND.to_owned(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Selects the provider whose status is polled.
    #[must_use]
    pub fn with_store_kind(mut self, store_kind: impl Into<String>) -> Self {
        self.store_kind = store_kind.into();
        self
    }

    /// Replaces the per-request timeout ceiling.
    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// URL of the provider status endpoint on `proxy`.
    #[must_use]
    pub fn status_url(&self, proxy: &Endpoint) -> String {
        proxy.http_url(&format!("/api/providers/{}", self.store_kind))
    }

    /// Polls `proxy` until its provider status endpoint answers `200 OK`.
    ///
    /// Connection failures, timeouts and any other status are treated as
    /// "not yet" and retried with backoff until the deadline passes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigReadinessError::NotReady`] when the deadline passes and
    /// [`ConfigReadinessError::Request`] when the request cannot be built.
    pub fn await_config_ready(&self, proxy: &Endpoint) -> Result<ConfigReady, ConfigReadinessError> {
        let url = self.status_url(proxy);
        let outcome = retry(&RetryPolicy::Backoff(self.policy), &self.clock, |attempt| {
            self.poll(&url, attempt)
        })
        .map_err(|source| ConfigReadinessError::Request { source })?;

        match outcome {
            RetryOutcome::Ready { attempts, elapsed } => {
                info!(
                    target: "routeprobe::config_ready",
                    event = "config_ready",
                    url = %url,
                    attempts,
                    elapsed_ms = elapsed.as_millis(),
                    "proxy configuration loaded"
                );
                Ok(ConfigReady { attempts, elapsed })
            }
            RetryOutcome::Exhausted {
                attempts,
                elapsed,
                last_reason,
            } => {
                warn!(
                    target: "routeprobe::config_ready",
                    event = "config_not_ready",
                    url = %url,
                    attempts,
                    elapsed_ms = elapsed.as_millis(),
                    "proxy configuration not loaded before the deadline"
                );
                Err(ConfigReadinessError::NotReady {
                    url,
                    attempts,
                    elapsed,
                    last: last_reason,
                })
            }
        }
    }

    fn poll(&self, url: &str, attempt: &Attempt) -> Result<ProbeOutcome, HttpProbeError> {
        let timeout = attempt.clamp(self.request_timeout);
        match self.http.get(url, timeout) {
            Ok(response) if response.status == 200 => Ok(ProbeOutcome::Ready),
            Ok(response) => {
                debug!(
                    target: "routeprobe::config_ready",
                    event = "poll_status",
                    attempt = attempt.number,
                    status = response.status,
                    "configuration status not ready"
                );
                Ok(ProbeOutcome::NotReady(format!("status {}", response.status)))
            }
            Err(error) if error.is_transient() => {
                debug!(
                    target: "routeprobe::config_ready",
                    event = "poll_failed",
                    attempt = attempt.number,
                    error = %error,
                    "configuration status unreachable"
                );
                Ok(ProbeOutcome::NotReady(error.to_string()))
            }
            Err(error) => Err(error),
        }
    }
}
