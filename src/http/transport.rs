//! Raw transport results.
//!
//! # Responsibilities
//! - Represent one HTTP exchange as `(status, body)` or a transport error
//! - Map `reqwest` failures onto a small, cloneable error set
//!
//! # Design Decisions
//! - Bodies are fully buffered; downstream payloads are small JSON documents
//! - Errors carry strings, not source errors, so outcomes stay `Clone`

use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Lossy UTF-8 view of the body, used for logging and error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| TransportError::InvalidResponse(format!("JSON decode failed: {}", e)))
    }

    /// Read a `reqwest` response to completion.
    pub async fn read(response: reqwest::Response) -> Result<Self, TransportError> {
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(TransportError::from)?;
        Ok(Self::new(status, body.to_vec()))
    }
}

/// Failure to complete an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established (refused, DNS, reset).
    #[error("connection failed: {0}")]
    Connect(String),

    /// No response within the per-attempt timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The HTTP client's own timeout fired first.
    #[error("client timed out: {0}")]
    ClientTimeout(String),

    /// Request failed mid-flight.
    #[error("request failed: {0}")]
    Request(String),

    /// A response arrived but could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built (bad URL, header or body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::ClientTimeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else if e.is_decode() {
            TransportError::InvalidResponse(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Product {
        id: u32,
        name: String,
    }

    #[test]
    fn test_json_decoding() {
        let resp = TransportResponse::new(200, r#"{"id":7,"name":"Milk"}"#);
        let product: Product = resp.json().unwrap();
        assert_eq!(product, Product { id: 7, name: "Milk".into() });
    }

    #[test]
    fn test_malformed_json_is_invalid_response() {
        let resp = TransportResponse::new(200, "<html>oops</html>");
        let err = resp.json::<Product>().unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "timed out after 250ms");
        assert!(TransportError::Connect("refused".into()).to_string().contains("refused"));
        assert_eq!(
            TransportError::ClientTimeout("operation timed out".into()).to_string(),
            "client timed out: operation timed out"
        );
    }
}
