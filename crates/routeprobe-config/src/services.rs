//! Port assignments for the processes taking part in a test run.

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_BACKEND_PORT, DEFAULT_PROXY_PORT, FIRST_BACKEND_PORT, SECOND_BACKEND_PORT,
};

/// Explicit port table for one test run.
///
/// Passing this value around instead of reading process-wide constants lets
/// parallel runs use distinct port sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServicePorts {
    /// Proxy HTTP entrypoint.
    pub proxy: u16,
    /// Catch-all backend behind `/`.
    pub default_backend: u16,
    /// Backend behind `/user/first`.
    pub first_backend: u16,
    /// Backend behind `/user/second`.
    pub second_backend: u16,
}

impl ServicePorts {
    /// Backend ports in launch order: default, first, second.
    #[must_use]
    pub const fn backends(&self) -> [u16; 3] {
        [self.default_backend, self.first_backend, self.second_backend]
    }
}

impl Default for ServicePorts {
    fn default() -> Self {
        Self {
            proxy: DEFAULT_PROXY_PORT,
            default_backend: DEFAULT_BACKEND_PORT,
            first_backend: FIRST_BACKEND_PORT,
            second_backend: SECOND_BACKEND_PORT,
        }
    }
}
