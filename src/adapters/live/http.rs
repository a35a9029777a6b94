//! Live adapter for the `HttpTransport` port using reqwest.

use reqwest::Client;

use crate::error::TransportError;
use crate::ports::http::{HttpTransport, TransportFuture, TransportRequest, TransportResponse};

/// Live HTTP transport backed by a reqwest client.
///
/// Certificate validation is disabled: this transport exists to capture
/// traffic against local fixture servers, which commonly use self-signed
/// certificates.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a new live transport.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .expect("failed to build http client");
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &TransportRequest) -> TransportFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let url = format!(
                "{}://{}:{}{}",
                request.protocol.as_str(),
                request.host,
                request.port,
                request.path
            );
            let method = reqwest::Method::from_bytes(request.method.as_bytes())
                .map_err(|e| TransportError::Http(format!("invalid method {}: {e}", request.method)))?;

            let mut builder = self.client.request(method, &url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(|e| TransportError::Http(e.to_string()))?;
            let status = response.status().as_u16();
            let raw_headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned())
                })
                .collect();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Http(e.to_string()))?
                .to_vec();

            Ok(TransportResponse { status, raw_headers, body })
        })
    }
}
