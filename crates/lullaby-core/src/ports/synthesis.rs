//! Speech-synthesis port.
//!
//! The TTS service answers in one of two shapes: the audio bytes themselves,
//! or a reference that has to be downloaded separately. [`SynthesizedAudio`]
//! is the tagged union both shapes are normalized into at the boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request to narrate a story text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub story_text: String,
    pub voice: String,
}

impl SynthesisRequest {
    pub fn new(story_text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            story_text: story_text.into(),
            voice: voice.into(),
        }
    }
}

/// What the TTS service returned.
#[derive(Clone, PartialEq, Eq)]
pub enum SynthesizedAudio {
    /// Downloadable reference (an absolute URL).
    Reference(String),
    /// Raw encoded audio.
    Bytes(Vec<u8>),
}

impl std::fmt::Debug for SynthesizedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference(url) => f.debug_tuple("Reference").field(url).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// Failure while retrieving narration audio.
///
/// `Clone` so that every caller waiting on the same in-flight fetch receives
/// the identical failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network or connectivity error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The service answered with an error status.
    #[error("Synthesis service returned {status}: {message}")]
    Service { status: u16, message: String },

    /// The service answered but the body was not usable audio.
    #[error("Invalid synthesis response: {message}")]
    InvalidResponse { message: String },

    /// Writing or reading the local cache slot failed.
    #[error("Cache storage error: {message}")]
    Storage { message: String },

    /// The fetch task ended without producing a result.
    #[error("Fetch was abandoned before completing")]
    Abandoned,
}

/// Port trait for the remote TTS service.
#[async_trait]
pub trait SpeechSynthesisPort: Send + Sync {
    /// Synthesize narration for `request`.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio, FetchError>;

    /// Download the bytes behind a [`SynthesizedAudio::Reference`].
    async fn download(&self, reference: &str) -> Result<Vec<u8>, FetchError>;
}
