//! Minimal HTTP/1.1 server for backend stubs and scripted test peers.
//!
//! A backend stub answers every request with the decimal port it listens on,
//! which is how the routing verifier identifies it through the proxy. The same
//! server takes an arbitrary responder, so tests can also stand up a fake
//! proxy or status endpoint.
//!
//! Each server owns a single-threaded tokio runtime on a background thread
//! and serves connections with hyper. Responders are synchronous and run on
//! the runtime's blocking pool, so they may issue blocking requests of their
//! own.

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONNECTION, CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const STUB_TARGET: &str = "routeprobe::stub";
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Request line of an incoming HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubRequest {
    /// Request method, e.g. `GET`.
    pub method: String,
    /// Request target as sent, e.g. `/user/first?x=1`.
    pub path: String,
}

/// Response written by a stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
    /// Status code.
    pub status: u16,
    /// Plain-text body.
    pub body: String,
}

impl StubResponse {
    /// `200 OK` with `body`.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Response with an explicit status.
    #[must_use]
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure to start a stub server.
#[derive(Debug, Error)]
pub enum StubError {
    /// The listener could not be bound.
    #[error("failed to bind stub server: {source}")]
    Bind {
        /// Socket error.
        #[source]
        source: io::Error,
    },
    /// The listener could not be configured.
    #[error("failed to configure stub listener: {source}")]
    Configure {
        /// Socket error.
        #[source]
        source: io::Error,
    },
    /// The async runtime could not be built.
    #[error("failed to start stub runtime: {source}")]
    Runtime {
        /// Runtime builder error.
        #[source]
        source: io::Error,
    },
    /// The server thread panicked.
    #[error("stub server thread panicked")]
    ThreadPanic,
}

type Responder = dyn Fn(&StubRequest) -> StubResponse + Send + Sync;

/// HTTP server running on a background thread until dropped.
pub struct StubServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl fmt::Debug for StubServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubServer")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl StubServer {
    /// Binds `addr` and serves every request with `responder`.
    ///
    /// Bind to port 0 to get an ephemeral port; [`StubServer::port`] reports
    /// the one chosen.
    ///
    /// # Errors
    ///
    /// Returns [`StubError`] when the listener or runtime cannot be set up.
    pub fn spawn<A, F>(addr: A, responder: F) -> Result<Self, StubError>
    where
        A: ToSocketAddrs,
        F: Fn(&StubRequest) -> StubResponse + Send + Sync + 'static,
    {
        let listener = StdTcpListener::bind(addr).map_err(|source| StubError::Bind { source })?;
        Self::start(listener, Arc::new(responder))
    }

    /// Backend stub on `host:port` answering every request with its port.
    ///
    /// # Errors
    ///
    /// Returns [`StubError`] when the listener or runtime cannot be set up.
    pub fn backend(host: &str, port: u16) -> Result<Self, StubError> {
        let listener =
            StdTcpListener::bind((host, port)).map_err(|source| StubError::Bind { source })?;
        let actual = listener
            .local_addr()
            .map_err(|source| StubError::Configure { source })?
            .port();
        Self::start(
            listener,
            Arc::new(move |_: &StubRequest| StubResponse::ok(actual.to_string())),
        )
    }

    fn start(std_listener: StdTcpListener, responder: Arc<Responder>) -> Result<Self, StubError> {
        let configure = |source| StubError::Configure { source };
        std_listener.set_nonblocking(true).map_err(configure)?;
        let local_addr = std_listener.local_addr().map_err(configure)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| StubError::Runtime { source })?;
        let listener = {
            let _context = runtime.enter();
            TcpListener::from_std(std_listener).map_err(configure)?
        };

        let (shutdown, stop) = oneshot::channel();
        let handle = thread::spawn(move || serve(&runtime, listener, stop, &responder));
        info!(
            target: STUB_TARGET,
            event = "stub_listening",
            address = %local_addr,
            "stub server listening"
        );
        Ok(Self {
            local_addr,
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Address the server is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Port the server is bound to.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Blocks while the server runs.
    ///
    /// The server only stops when it is dropped, so this returns only if the
    /// server thread dies; callers serving until killed use it to park.
    ///
    /// # Errors
    ///
    /// Returns [`StubError::ThreadPanic`] when the server thread panicked.
    pub fn join(mut self) -> Result<(), StubError> {
        self.handle.take().map_or(Ok(()), |handle| {
            handle.join().map_err(|_| StubError::ThreadPanic)
        })
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take()
            && shutdown.send(()).is_err()
        {
            debug!(
                target: STUB_TARGET,
                event = "stub_already_stopped",
                address = %self.local_addr,
                "stub server thread exited before shutdown"
            );
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!(
                target: STUB_TARGET,
                event = "stub_thread_panicked",
                address = %self.local_addr,
                "stub server thread panicked"
            );
        }
    }
}

fn serve(
    runtime: &Runtime,
    listener: TcpListener,
    stop: oneshot::Receiver<()>,
    responder: &Arc<Responder>,
) {
    runtime.block_on(accept_loop(listener, stop, responder));
}

async fn accept_loop(
    listener: TcpListener,
    mut stop: oneshot::Receiver<()>,
    responder: &Arc<Responder>,
) {
    let mut last_error = None::<io::ErrorKind>;
    loop {
        tokio::select! {
            _ = &mut stop => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    last_error = None;
                    tokio::spawn(serve_connection(stream, peer, Arc::clone(responder)));
                }
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(
                            target: STUB_TARGET,
                            event = "accept_failed",
                            error = %error,
                            "stub accept error"
                        );
                    }
                    last_error = Some(kind);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            },
        }
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, handler: Arc<Responder>) {
    let service = service_fn(move |request: Request<Incoming>| {
        let stub_request = StubRequest {
            method: request.method().to_string(),
            path: request
                .uri()
                .path_and_query()
                .map_or_else(|| request.uri().path().to_owned(), ToString::to_string),
        };
        let responder = Arc::clone(&handler);
        async move { Ok::<_, Infallible>(respond(stub_request, responder).await) }
    });
    // Readiness probes connect and close without sending anything; hyper
    // reports those as errors, which are only worth a debug line.
    if let Err(error) = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!(
            target: STUB_TARGET,
            event = "connection_failed",
            peer = %peer,
            error = %error,
            "stub connection ended with an error"
        );
    }
}

async fn respond(stub_request: StubRequest, responder: Arc<Responder>) -> Response<Full<Bytes>> {
    let reply = match tokio::task::spawn_blocking(move || {
        let reply = responder(&stub_request);
        (stub_request, reply)
    })
    .await
    {
        Ok((served, reply)) => {
            debug!(
                target: STUB_TARGET,
                event = "request_served",
                method = %served.method,
                path = %served.path,
                status = reply.status,
                "stub answered request"
            );
            reply
        }
        Err(error) => {
            warn!(
                target: STUB_TARGET,
                event = "responder_failed",
                error = %error,
                "stub responder panicked"
            );
            StubResponse::with_status(500, "responder failed")
        }
    };
    into_response(reply)
}

fn into_response(reply: StubResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(reply.body)));
    *response.status_mut() =
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    response
}
