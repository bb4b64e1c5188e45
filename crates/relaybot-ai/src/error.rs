//! Error types for the gateway clients

use thiserror::Error;

/// Gateway error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {message}")]
    ServiceHttp {
        service: String,
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    /// Whether the request that produced this error may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http(err) => err.is_connect() || err.is_timeout(),
            Self::ServiceHttp { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse(_) | Self::EmptyResult(_) | Self::Json(_) => false,
        }
    }

    /// Whether the error happened before a usable payload reached us.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Http(_) | Self::ServiceHttp { .. }
        )
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, AiError>;
