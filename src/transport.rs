//! HTTP transport boundary.
//!
//! The delivery core issues exactly one POST per attempt through a
//! [`Transport`]. Timeouts and connection handling belong to the transport;
//! the core only classifies what comes back.
//!
//! [`ReqwestTransport`] is the production implementation. Tests inject their
//! own recording transports.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::TransportError;

/// Response bodies are kept only for diagnostics and cut to this many bytes.
pub const MAX_RESPONSE_BODY: usize = 512;

/// A fully built push request.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Subscription endpoint.
    pub endpoint: Url,
    /// Request headers in send order.
    pub headers: Vec<(&'static str, String)>,
    /// Encrypted body (empty for a tickle push).
    pub body: Vec<u8>,
}

impl PushRequest {
    /// First header value with the given name (ASCII case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the push service answered.
#[derive(Debug, Clone, Default)]
pub struct PushResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body, possibly truncated.
    pub body: String,
}

impl PushResponse {
    /// Response with a status and no headers or body.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Add a header (builder style).
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First header value with the given name (ASCII case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Blocking HTTP client capable of sending a [`PushRequest`].
pub trait Transport: Send + Sync {
    /// Perform the request and return the response, whatever its status.
    fn send(&self, request: &PushRequest) -> Result<PushResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &PushRequest) -> Result<PushResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &PushRequest) -> Result<PushResponse, TransportError> {
        (**self).send(request)
    }
}

/// [`Transport`] backed by `reqwest::blocking`.
///
/// Reuse one instance across sends for connection pooling.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("botster-push/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(e.without_url().to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &PushRequest) -> Result<PushResponse, TransportError> {
        let mut builder = self.client.post(request.endpoint.clone());
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder
            .body(request.body.clone())
            .send()
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();

        // The body is diagnostic only; a read failure leaves it empty.
        let body = response
            .bytes()
            .map(|bytes| truncate_body(&bytes))
            .unwrap_or_default();

        Ok(PushResponse {
            status,
            headers,
            body,
        })
    }
}

/// Keep at most [`MAX_RESPONSE_BODY`] bytes, cut on a char boundary.
pub(crate) fn truncate_body(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_RESPONSE_BODY)]);
    text.trim_end_matches('\u{FFFD}').to_string()
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    // Endpoint URLs are bearer capabilities; keep them out of error text.
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = PushResponse::with_status(201).header("Location", "https://push.example/m/1");
        assert_eq!(response.header_value("location"), Some("https://push.example/m/1"));
        assert_eq!(response.header_value("retry-after"), None);

        let request = PushRequest {
            endpoint: Url::parse("https://push.example/abc").expect("url"),
            headers: vec![("TTL", "60".to_string())],
            body: Vec::new(),
        };
        assert_eq!(request.header("ttl"), Some("60"));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_RESPONSE_BODY * 2);
        assert_eq!(truncate_body(long.as_bytes()).len(), MAX_RESPONSE_BODY);

        // A multi-byte char straddling the cut is dropped, not mangled
        let mut text = "a".repeat(MAX_RESPONSE_BODY - 1);
        text.push('é');
        let cut = truncate_body(text.as_bytes());
        assert_eq!(cut, "a".repeat(MAX_RESPONSE_BODY - 1));
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
