//! Readiness polling and routing verification for a path-routing HTTP proxy.
//!
//! A test run starts a proxy and several backends, then asks two questions:
//! are the processes accepting connections yet, and does the proxy send each
//! request path to the backend its dynamic configuration names? This crate
//! answers them with three components, used in order:
//!
//! - [`ReadinessPoller`] waits for TCP endpoints with a bounded number of
//!   attempts at a fixed interval.
//! - [`ConfigReadinessPoller`] waits for the proxy's provider status endpoint
//!   to answer `200 OK`, backing off exponentially inside a deadline.
//! - [`RoutingVerifier`] requests each path in a [`RouteTable`] through the
//!   proxy and checks which backend answered.
//!
//! Both pollers run on the shared [`retry`] loop. Supporting pieces model the
//! dynamic store writes ([`store`]) and provide a conforming backend stub
//! ([`stub`]).
//!
//! # Example
//!
//! ```no_run
//! use routeprobe::{
//!     BlockingHttpClient, ConfigReadinessPoller, ExponentialBackoff, FixedInterval,
//!     ReadinessPoller, RouteTable, RoutingVerifier,
//! };
//! use routeprobe_config::{Endpoint, ServicePorts};
//! use std::time::Duration;
//!
//! let ports = ServicePorts::default();
//! let proxy = Endpoint::new("localhost", ports.proxy)?;
//! let tcp = FixedInterval::new(20, Duration::from_millis(100))?;
//! assert!(ReadinessPoller::new().await_ready(&proxy, &tcp)?);
//!
//! let backoff = ExponentialBackoff::new(
//!     Duration::from_secs(10),
//!     Duration::from_millis(100),
//!     Duration::from_secs(2),
//! )?;
//! ConfigReadinessPoller::new(backoff)?.await_config_ready(&proxy)?;
//!
//! let verifier = RoutingVerifier::new(BlockingHttpClient::new()?);
//! verifier.verify_routes(&proxy, &RouteTable::default_for(&ports))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clock;
pub mod config_ready;
pub mod http;
pub mod readiness;
pub mod retry;
pub mod routing;
pub mod store;
pub mod stub;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config_ready::{ConfigReadinessError, ConfigReadinessPoller, ConfigReady};
pub use http::{BlockingHttpClient, ClientBuildError, HttpProbe, HttpProbeError, ProbeResponse};
pub use readiness::{ReadinessError, ReadinessPoller};
pub use retry::{
    Attempt, BackoffSchedule, ExponentialBackoff, FixedInterval, PolicyError, ProbeOutcome,
    RetryOutcome, RetryPolicy, retry,
};
pub use routing::{
    BackendId, RouteExpectation, RouteFailure, RouteFailureKind, RouteParseError, RouteTable,
    RoutesVerified, RoutingVerifier,
};
pub use store::{ConfigStore, MemoryStore, ProxyLayout, StoreEntry, StoreError, StoreSettings};
pub use stub::{StubError, StubRequest, StubResponse, StubServer};
