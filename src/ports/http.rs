//! HTTP transport port for outbound requests.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::TransportError;

/// Boxed future type alias used by [`HttpTransport`] to keep the trait
/// dyn-compatible.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>;

/// Wire protocol of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Plain-text HTTP.
    Http,
    /// TLS HTTP.
    Https,
}

impl Protocol {
    /// URL scheme string for this protocol.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Default port for this protocol.
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// A normalized outbound request as observed at the transport seam.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Wire protocol.
    pub protocol: Protocol,
    /// Upper-case HTTP method.
    pub method: String,
    /// Target host.
    pub host: String,
    /// Target port.
    pub port: u16,
    /// Path including the query string.
    pub path: String,
    /// Lower-cased request headers.
    pub headers: BTreeMap<String, String>,
    /// Request body, if one was written.
    pub body: Option<String>,
}

impl TransportRequest {
    /// Origin of this request (`proto://host:port`).
    #[must_use]
    pub fn scope(&self) -> String {
        format!("{}://{}:{}", self.protocol.as_str(), self.host, self.port)
    }

    /// Composite matching key: `method scope+path`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{} {}{}", self.method, self.scope(), self.path)
    }
}

/// A response as observed at the transport seam.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in wire order, case preserved.
    pub raw_headers: Vec<(String, String)>,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Response headers as a flat name/value list (`rawHeaders` shape).
    #[must_use]
    pub fn raw_header_list(&self) -> Vec<String> {
        let mut flat = Vec::with_capacity(self.raw_headers.len() * 2);
        for (name, value) in &self.raw_headers {
            flat.push(name.clone());
            flat.push(value.clone());
        }
        flat
    }
}

/// Sends outbound HTTP(S) requests.
///
/// Abstracting the transport lets the recorder observe, replay, and heal
/// traffic without owning an HTTP stack.
pub trait HttpTransport: Send + Sync {
    /// Performs the request and resolves with the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails (connect, TLS, no matching
    /// recording when replaying, etc.).
    fn send(&self, request: &TransportRequest) -> TransportFuture<'_>;
}
