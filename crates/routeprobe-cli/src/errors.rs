//! Error type for the CLI runtime.

use std::io;
use std::sync::Arc;

use routeprobe::{
    ClientBuildError, ConfigReadinessError, PolicyError, ReadinessError, RouteFailure,
    RouteParseError, StubError,
};
use routeprobe_config::EndpointError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),
    #[error("invalid retry settings: {0}")]
    Policy(#[from] PolicyError),
    #[error("invalid route: {0}")]
    Route(#[from] RouteParseError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Client(#[from] ClientBuildError),
    #[error("readiness probe failed: {0}")]
    Readiness(#[from] ReadinessError),
    #[error("not ready: {}", .endpoints.join(", "))]
    NotReady { endpoints: Vec<String> },
    #[error(transparent)]
    ConfigReadiness(#[from] ConfigReadinessError),
    #[error("routing verification failed: {0}")]
    Routing(#[from] RouteFailure),
    #[error(transparent)]
    Stub(#[from] StubError),
    #[error("failed to serialise layout entry: {0}")]
    SerialiseLayout(serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
