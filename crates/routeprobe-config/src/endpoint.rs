//! `host:port` endpoints for the proxy and backends.

use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::num::NonZeroU16;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Network location of a process under test.
///
/// Endpoints are immutable once built; the port is guaranteed to be in
/// `1..=65535`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    host: String,
    port: NonZeroU16,
}

impl Endpoint {
    /// Builds an endpoint, rejecting an empty host or port zero.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, EndpointError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(EndpointError::MissingHost);
        }
        let port = NonZeroU16::new(port).ok_or(EndpointError::ZeroPort { host: host.clone() })?;
        Ok(Self { host, port })
    }

    /// Host name or address literal.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Listening port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port.get()
    }

    /// Resolves the endpoint into socket addresses.
    pub fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port()).to_socket_addrs().map(Iterator::collect)
    }

    /// Builds an `http://` URL for `path` on this endpoint.
    ///
    /// A leading `/` is added to `path` when missing.
    #[must_use]
    pub fn http_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("http://{self}{path}")
        } else {
            format!("http://{self}/{path}")
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(formatter, "[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(&format!("tcp://{}", input.trim()))
            .map_err(|source| EndpointError::Parse {
                input: input.to_owned(),
                source,
            })?;
        let host = url
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .filter(|host| !host.is_empty())
            .ok_or(EndpointError::MissingHost)?;
        let port = url.port().ok_or_else(|| EndpointError::MissingPort {
            input: input.to_owned(),
        })?;
        Self::new(host, port)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

/// Errors raised while building or parsing an [`Endpoint`].
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Host was empty.
    #[error("endpoint host must not be empty")]
    MissingHost,
    /// Port zero cannot be connected to.
    #[error("endpoint {host} must use a port between 1 and 65535")]
    ZeroPort {
        /// Host the port was given for.
        host: String,
    },
    /// Port was absent from the textual form.
    #[error("missing port in endpoint '{input}'")]
    MissingPort {
        /// Text as supplied.
        input: String,
    },
    /// Text was not a `host:port` pair.
    #[error("failed to parse endpoint '{input}': {source}")]
    Parse {
        /// Text as supplied.
        input: String,
        /// URL parser error.
        #[source]
        source: url::ParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn rejects_port_zero() {
        let error = Endpoint::new("localhost", 0).expect_err("port zero must fail");
        assert!(matches!(error, EndpointError::ZeroPort { .. }));
    }

    #[test]
    fn rejects_blank_host() {
        let error = Endpoint::new("  ", 80).expect_err("blank host must fail");
        assert!(matches!(error, EndpointError::MissingHost));
    }

    #[rstest]
    #[case("localhost:8000", "localhost", 8000)]
    #[case("127.0.0.1:9090", "127.0.0.1", 9090)]
    #[case("[::1]:9099", "::1", 9099)]
    fn parses_host_port_pairs(#[case] input: &str, #[case] host: &str, #[case] port: u16) {
        let endpoint: Endpoint = input.parse().expect("parse endpoint");
        assert_eq!(endpoint.host(), host);
        assert_eq!(endpoint.port(), port);
        assert_eq!(endpoint.to_string(), input);
    }

    #[test]
    fn parse_requires_port() {
        let error = "localhost".parse::<Endpoint>().expect_err("port missing");
        assert!(matches!(error, EndpointError::MissingPort { .. }));
    }

    #[rstest]
    #[case("/user/first", "http://localhost:8000/user/first")]
    #[case("otherthings", "http://localhost:8000/otherthings")]
    #[case("/", "http://localhost:8000/")]
    fn http_url_joins_a_single_slash(#[case] path: &str, #[case] expected: &str) {
        let endpoint = Endpoint::new("localhost", 8000).expect("endpoint");
        assert_eq!(endpoint.http_url(path), expected);
    }
}
