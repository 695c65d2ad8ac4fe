//! Data transfer objects for web requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query for a single batch endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    /// Batch to fetch (defaults to the first)
    #[serde(rename = "batch-number")]
    pub batch_number: Option<u32>,

    /// Only records changed after this instant
    #[serde(rename = "effective-start-timestamp")]
    pub since: Option<DateTime<Utc>>,
}

/// Registry status.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Number of nodes in the registry
    pub nodes: usize,

    /// Start time of the last successful refresh
    pub last_refresh: Option<DateTime<Utc>>,

    /// Whether periodic refresh is scheduled
    pub scheduled: bool,

    /// Whether a refresh is running right now
    pub refreshing: bool,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
