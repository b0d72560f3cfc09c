//! TCP readiness polling.
//!
//! A process is ready once it accepts TCP connections on its port. The probe
//! connects, shuts the connection down in both directions and drops it; no
//! bytes are exchanged, so protocol correctness is not part of the check.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::panic;
use std::thread;
use std::time::Duration;

use routeprobe_config::Endpoint;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::retry::{Attempt, FixedInterval, ProbeOutcome, RetryPolicy, retry};

/// Default timeout for a single connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Non-transient failure while probing an endpoint.
///
/// Refused, reset, unreachable and timed-out connections are not errors; they
/// mean "not ready yet" and are retried.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// The host name could not be resolved.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        /// Endpoint being probed.
        endpoint: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The host name resolved to no address.
    #[error("{endpoint} resolved to no socket address")]
    NoAddress {
        /// Endpoint being probed.
        endpoint: String,
    },
    /// A connect attempt failed in a way retrying cannot fix.
    #[error("failed to probe {endpoint} at {address}: {source}")]
    Connect {
        /// Endpoint being probed.
        endpoint: String,
        /// Resolved address that failed.
        address: SocketAddr,
        /// Socket error.
        #[source]
        source: io::Error,
    },
}

/// Polls endpoints until they accept TCP connections.
///
/// The poller holds no per-endpoint state, so one instance can serve many
/// endpoints from many threads.
#[derive(Debug, Clone)]
pub struct ReadinessPoller<C = SystemClock> {
    clock: C,
    connect_timeout: Duration,
}

impl ReadinessPoller<SystemClock> {
    /// Creates a poller on the system clock with a one-second connect timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for ReadinessPoller<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ReadinessPoller<C>
where
    C: Clock,
{
    /// Creates a poller driven by `clock`.
    #[must_use]
    pub const fn with_clock(clock: C) -> Self {
        Self {
            clock,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Replaces the per-attempt connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Per-attempt connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Waits for `endpoint` to accept a TCP connection.
    ///
    /// Returns `Ok(true)` on the first successful connect and `Ok(false)` once
    /// `policy.max_attempts` attempts have failed. A policy allowing zero
    /// attempts makes no connection and returns `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError`] when the endpoint cannot be resolved or a
    /// connect fails for a reason other than the target not listening yet.
    pub fn await_ready(
        &self,
        endpoint: &Endpoint,
        policy: &FixedInterval,
    ) -> Result<bool, ReadinessError> {
        if policy.max_attempts == 0 {
            warn!(
                target: "routeprobe::readiness",
                event = "empty_policy",
                endpoint = %endpoint,
                "retry policy allows no attempts; treating endpoint as not ready"
            );
            return Ok(false);
        }

        let addresses = resolve(endpoint)?;
        let outcome = retry(&RetryPolicy::Fixed(*policy), &self.clock, |attempt| {
            self.probe(endpoint, &addresses, attempt)
        })?;

        if outcome.is_ready() {
            info!(
                target: "routeprobe::readiness",
                event = "endpoint_ready",
                endpoint = %endpoint,
                attempts = outcome.attempts(),
                elapsed_ms = outcome.elapsed().as_millis(),
                "endpoint accepting connections"
            );
        } else {
            warn!(
                target: "routeprobe::readiness",
                event = "endpoint_not_ready",
                endpoint = %endpoint,
                attempts = outcome.attempts(),
                elapsed_ms = outcome.elapsed().as_millis(),
                "endpoint never accepted a connection"
            );
        }
        Ok(outcome.is_ready())
    }

    /// Polls every endpoint concurrently and returns the ones that never
    /// became ready, in input order.
    ///
    /// # Errors
    ///
    /// Returns the first [`ReadinessError`] raised by any endpoint.
    pub fn await_all_ready(
        &self,
        endpoints: &[Endpoint],
        policy: &FixedInterval,
    ) -> Result<Vec<Endpoint>, ReadinessError>
    where
        C: Sync,
    {
        let results: Vec<Result<bool, ReadinessError>> = thread::scope(|scope| {
            let handles: Vec<_> = endpoints
                .iter()
                .map(|endpoint| scope.spawn(move || self.await_ready(endpoint, policy)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
                .collect()
        });

        let mut pending = Vec::new();
        for (endpoint, result) in endpoints.iter().zip(results) {
            if !result? {
                pending.push(endpoint.clone());
            }
        }
        Ok(pending)
    }

    fn probe(
        &self,
        endpoint: &Endpoint,
        addresses: &[SocketAddr],
        attempt: &Attempt,
    ) -> Result<ProbeOutcome, ReadinessError> {
        let mut last_failure = String::new();
        for address in addresses {
            match connect_and_release(address, self.connect_timeout) {
                Ok(()) => return Ok(ProbeOutcome::Ready),
                Err(error) if is_transient(&error) => {
                    debug!(
                        target: "routeprobe::readiness",
                        event = "probe_failed",
                        endpoint = %endpoint,
                        address = %address,
                        attempt = attempt.number,
                        error = %error,
                        "endpoint not accepting connections yet"
                    );
                    last_failure = format!("{address}: {error}");
                }
                Err(source) => {
                    return Err(ReadinessError::Connect {
                        endpoint: endpoint.to_string(),
                        address: *address,
                        source,
                    });
                }
            }
        }
        Ok(ProbeOutcome::NotReady(last_failure))
    }
}

fn resolve(endpoint: &Endpoint) -> Result<Vec<SocketAddr>, ReadinessError> {
    let addresses = endpoint
        .socket_addrs()
        .map_err(|source| ReadinessError::Resolve {
            endpoint: endpoint.to_string(),
            source,
        })?;
    if addresses.is_empty() {
        return Err(ReadinessError::NoAddress {
            endpoint: endpoint.to_string(),
        });
    }
    Ok(addresses)
}

/// Connects to `address`, then shuts the stream down and drops it.
fn connect_and_release(address: &SocketAddr, timeout: Duration) -> io::Result<()> {
    let stream = TcpStream::connect_timeout(address, timeout)?;
    // The peer may already have closed its side; the socket is released on drop
    // either way.
    if let Err(error) = stream.shutdown(Shutdown::Both) {
        debug!(
            target: "routeprobe::readiness",
            event = "shutdown_failed",
            address = %address,
            error = %error,
            "ignoring shutdown error on probe socket"
        );
    }
    drop(stream);
    Ok(())
}

/// Determines whether a connect error means "not listening yet".
///
/// Everything else (permission problems, invalid input such as a zero
/// timeout) is a configuration or environment fault and is surfaced.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::NetworkDown
    )
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::refused(io::ErrorKind::ConnectionRefused)]
    #[case::reset(io::ErrorKind::ConnectionReset)]
    #[case::timed_out(io::ErrorKind::TimedOut)]
    #[case::host_unreachable(io::ErrorKind::HostUnreachable)]
    #[case::network_unreachable(io::ErrorKind::NetworkUnreachable)]
    #[case::addr_not_available(io::ErrorKind::AddrNotAvailable)]
    fn transient_errors_are_retried(#[case] kind: io::ErrorKind) {
        assert!(is_transient(&io::Error::new(kind, "probe error")));
    }

    #[rstest]
    #[case::permission_denied(io::ErrorKind::PermissionDenied)]
    #[case::invalid_input(io::ErrorKind::InvalidInput)]
    #[case::other(io::ErrorKind::Other)]
    fn other_errors_are_surfaced(#[case] kind: io::ErrorKind) {
        assert!(!is_transient(&io::Error::new(kind, "probe error")));
    }

    #[test]
    fn zero_connect_timeout_is_a_fatal_error() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        let endpoint = Endpoint::new("127.0.0.1", port).expect("endpoint");
        let poller = ReadinessPoller::new().with_connect_timeout(Duration::ZERO);
        let policy = FixedInterval::new(3, Duration::from_millis(1)).expect("policy");

        let error = poller
            .await_ready(&endpoint, &policy)
            .expect_err("zero timeout must be rejected");
        assert!(matches!(error, ReadinessError::Connect { .. }));
    }
}
