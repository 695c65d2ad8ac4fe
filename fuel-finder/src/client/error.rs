//! Fuel Finder client error types.

/// Errors from the Fuel Finder HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The client was constructed with settings it cannot work with
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A request path could not be resolved against the API base URL
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// No response was received (connection failure, timeout, etc.)
    #[error("network error: {message}")]
    Network { message: String },

    /// The API answered with a non-success status
    #[error("HTTP error {status}: {reason}")]
    HttpStatus { status: u16, reason: String },

    /// Credentials were rejected and could not be renewed
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// JSON (de)serialization failed
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },
}

impl ClientError {
    /// Build a JSON error, keeping the start of the offending body.
    pub(crate) fn json(err: impl std::fmt::Display, body: Option<&str>) -> Self {
        ClientError::Json {
            message: err.to_string(),
            body: body.map(|b| b.chars().take(500).collect()),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network {
            message: err.to_string(),
        }
    }
}
