//! Scripted transport for testing without API access.
//!
//! Responses come from a handler closure, and every request is recorded so
//! tests can count calls per endpoint.

use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::Semaphore;

use super::client::ClientConfig;
use super::error::ClientError;
use super::transport::{HttpRequest, HttpResponse, Transport};

/// Base URL used by test configs.
pub(crate) const BASE_URL: &str = "http://fuel.test/api/";

type Handler = dyn Fn(&HttpRequest, usize) -> Result<HttpResponse, ClientError> + Send + Sync;

/// Transport that answers from a closure.
///
/// The handler receives the request and how many earlier requests were made
/// with the same method and path.
pub(crate) struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
    /// When set, each request uses up one permit before it is answered.
    gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub(crate) fn new(
        handler: impl Fn(&HttpRequest, usize) -> Result<HttpResponse, ClientError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// A transport that fails the test if it is ever used.
    pub(crate) fn unreachable() -> Self {
        Self::new(|request, _| panic!("unexpected request to {}", request.url))
    }

    /// Hold every request until `gate` hands out a permit. Each permit lets
    /// exactly one request through.
    pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Every request received so far, in order.
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests made to an API-relative path.
    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| endpoint(r) == path)
            .count()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let nth = {
            let mut requests = self.requests.lock().unwrap();
            let nth = requests
                .iter()
                .filter(|r| r.method == request.method && r.url.path() == request.url.path())
                .count();
            requests.push(request.clone());
            nth
        };

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        (self.handler)(&request, nth)
    }
}

/// Client config pointing at [`BASE_URL`].
pub(crate) fn config() -> ClientConfig {
    ClientConfig::new("test-id", "test-secret").with_base_url(BASE_URL)
}

/// Path relative to the versioned base, e.g. `pfs/fuel-prices`.
pub(crate) fn endpoint(request: &HttpRequest) -> &str {
    let path = request.url.path();
    path.strip_prefix("/api/v1/").unwrap_or(path)
}

/// Decoded value of a query parameter.
pub(crate) fn query(request: &HttpRequest, name: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub(crate) fn ok(body: serde_json::Value) -> HttpResponse {
    HttpResponse::json(StatusCode::OK, &body)
}

pub(crate) fn status(status: StatusCode) -> HttpResponse {
    HttpResponse::new(status, "")
}

/// Successful `oauth/generate_access_token` response.
pub(crate) fn token_response(access_token: &str, refresh_token: &str) -> HttpResponse {
    ok(json!({
        "success": true,
        "data": {
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": refresh_token
        },
        "message": "ok"
    }))
}

/// Serves batch `n` (1-based) of `node_id`s from both `pfs` and
/// `pfs/fuel-prices`; batches past the end are empty.
pub(crate) fn batches(batches: Vec<Vec<&'static str>>) -> MockTransport {
    MockTransport::new(move |request, _| {
        let index: usize = query(request, "batch-number")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        let page: Vec<_> = batches
            .get(index.wrapping_sub(1))
            .into_iter()
            .flatten()
            .map(|id| json!({ "node_id": id }))
            .collect();
        Ok(ok(json!(page)))
    })
}
