//! The "make an HTTP request" capability the session manager is built on.
//!
//! [`HttpTransport`] is the production implementation on top of `reqwest`.
//! Its cookie store carries the Backup Service session between requests, so
//! callers never see the login cookie.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("could not build HTTP client: {0}")]
    Setup(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_builder() {
            TransportError::Setup(err.to_string())
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

/// A fully read response. Only the status is interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// `reqwest` backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally and the clones share cookies.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(accept_invalid_certs: bool, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "Sending request");

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Response received");

        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        let response = ApiResponse::new(StatusCode::OK, r#"[{"guid":"a"}]"#);
        assert!(response.is_success());
        assert_eq!(response.text(), r#"[{"guid":"a"}]"#);

        let parsed: Vec<serde_json::Value> = response.json().unwrap();
        assert_eq!(parsed[0]["guid"], "a");

        let failed = ApiResponse::new(StatusCode::UNAUTHORIZED, Vec::new());
        assert!(!failed.is_success());
        assert!(failed.json::<serde_json::Value>().is_err());
    }
}
