//! Internal error types for the story service.
//!
//! These are mapped to the core port errors at the boundary (see `port.rs`).

use thiserror::Error;

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service answered with an error status.
    #[error("Story service request failed with status {status}: {url}")]
    ApiRequestFailed { status: u16, url: String },

    /// The service answered with something we cannot use.
    #[error("Invalid response from story service: {message}")]
    InvalidResponse { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid base64 audio: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl RemoteError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
