//! The single HTTP primitive the client is built on.
//!
//! A [`Transport`] performs exactly one request and reports the status and
//! raw body. Authentication, caching and retries live in the client; the
//! transport never retries and never interprets status codes.

use std::future::Future;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};

use super::error::ClientError;

/// One outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

/// A response as received, before any status handling.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A response with a JSON body.
    pub fn json(status: StatusCode, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Whether this is a 401 or 403.
    pub fn is_auth_failure(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }

    /// Reason phrase for the status.
    pub fn reason(&self) -> String {
        self.status
            .canonical_reason()
            .unwrap_or("Unknown Status")
            .to_string()
    }

    /// Parse the body as JSON. An empty body is JSON `null`.
    pub fn into_json(self) -> Result<serde_json::Value, ClientError> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| ClientError::json(e, Some(&self.body)))
    }
}

/// Performs one HTTP exchange.
///
/// This abstraction allows the client to be tested without a network.
pub trait Transport: Send + Sync {
    /// Send the request. Only failures to obtain a response are errors.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ClientError>> + Send;
}

/// Transport backed by a reqwest connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with reqwest's defaults (no overall deadline).
    pub fn new() -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http })
    }

    /// Create a transport whose requests fail after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}
