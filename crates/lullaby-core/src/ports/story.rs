//! Story-generation port.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Story, StoryRequest};

/// Errors from story generation.
///
/// Every variant surfaces to the user as "could not generate".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoryError {
    /// The prompt was empty after trimming.
    #[error("Story prompt cannot be empty")]
    EmptyPrompt,

    /// Network or connectivity error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The service answered with an error status.
    #[error("Story service returned {status}: {message}")]
    Service { status: u16, message: String },

    /// The service answered but the body was not a story.
    #[error("Invalid story response: {message}")]
    InvalidResponse { message: String },
}

/// Port trait for the remote story-generation service.
#[async_trait]
pub trait StoryGeneratorPort: Send + Sync {
    /// Generate a story for `request`.
    ///
    /// Implementations call [`StoryRequest::validate`] before any network I/O.
    async fn generate(&self, request: &StoryRequest) -> Result<Story, StoryError>;
}
