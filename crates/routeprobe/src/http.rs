//! Blocking HTTP probes.
//!
//! The pollers and the routing verifier only need one operation: a GET that
//! yields a status code and a body. [`HttpProbe`] is that seam; the production
//! implementation wraps `reqwest`'s blocking client.

use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

impl ProbeResponse {
    /// Builds a response value.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failure to obtain a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpProbeError {
    /// The exchange failed on the network: refused, reset, timed out, or the
    /// body could not be read. Retrying may help.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Target URL.
        url: String,
        /// Rendered client error.
        message: String,
    },
    /// The request could not be built, typically a malformed URL. Retrying
    /// cannot help.
    #[error("invalid request for {url}: {message}")]
    InvalidRequest {
        /// Target URL.
        url: String,
        /// Rendered client error.
        message: String,
    },
}

impl HttpProbeError {
    /// Whether a later attempt could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Issues blocking HTTP GET requests.
pub trait HttpProbe {
    /// Fetches `url`, giving up after `timeout`.
    ///
    /// Any status code is a successful exchange; interpreting it is up to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`HttpProbeError`] when no response was received.
    fn get(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, HttpProbeError>;
}

impl<H> HttpProbe for &H
where
    H: HttpProbe + ?Sized,
{
    fn get(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, HttpProbeError> {
        (**self).get(url, timeout)
    }
}

/// Failed to construct the HTTP client.
#[derive(Debug, Error)]
#[error("failed to build HTTP client: {source}")]
pub struct ClientBuildError {
    #[source]
    source: reqwest::Error,
}

/// [`HttpProbe`] backed by `reqwest::blocking`.
///
/// Idle connections are not pooled, so every probe opens a fresh connection
/// and releases it once the body has been read. Proxy environment variables
/// are ignored; probes always go straight to the target.
#[derive(Debug, Clone)]
pub struct BlockingHttpClient {
    client: Client,
}

impl BlockingHttpClient {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError`] when the underlying client cannot start.
    pub fn new() -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .map_err(|source| ClientBuildError { source })?;
        Ok(Self { client })
    }
}

impl HttpProbe for BlockingHttpClient {
    fn get(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, HttpProbeError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|error| classify(url, &error))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|error| classify(url, &error))?;
        Ok(ProbeResponse { status, body })
    }
}

fn classify(url: &str, error: &reqwest::Error) -> HttpProbeError {
    if error.is_builder() {
        HttpProbeError::InvalidRequest {
            url: url.to_owned(),
            message: error.to_string(),
        }
    } else {
        HttpProbeError::Transport {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, true)]
    #[case(204, true)]
    #[case(299, true)]
    #[case(301, false)]
    #[case(404, false)]
    #[case(502, false)]
    fn success_means_2xx(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(ProbeResponse::new(status, "").is_success(), expected);
    }

    #[test]
    fn malformed_url_is_not_transient() {
        let client = BlockingHttpClient::new().expect("build client");
        let error = client
            .get("http://exa mple:80/", Duration::from_millis(100))
            .expect_err("malformed url must fail");
        assert!(!error.is_transient(), "got {error:?}");
    }

    #[test]
    fn refused_connection_is_transient() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let client = BlockingHttpClient::new().expect("build client");
        let error = client
            .get(&format!("http://127.0.0.1:{port}/"), Duration::from_millis(500))
            .expect_err("nothing is listening");
        assert!(error.is_transient(), "got {error:?}");
    }
}
