//! Core port implementations for `StoryServiceClient`.
//!
//! Converts internal [`RemoteError`]s into the core-owned `StoryError` and
//! `FetchError` at the boundary.

use async_trait::async_trait;
use lullaby_core::{
    FetchError, SpeechSynthesisPort, Story, StoryError, StoryGeneratorPort, StoryRequest,
    SynthesisRequest, SynthesizedAudio,
};

use crate::client::StoryServiceClient;
use crate::error::RemoteError;
use crate::http::HttpBackend;

// ============================================================================
// Error Mapping
// ============================================================================

fn to_story_error(err: RemoteError) -> StoryError {
    match err {
        RemoteError::ApiRequestFailed { status, url } => StoryError::Service {
            status,
            message: url,
        },
        RemoteError::Network(e) => StoryError::Network {
            message: e.to_string(),
        },
        RemoteError::InvalidResponse { message } => StoryError::InvalidResponse { message },
        e @ (RemoteError::InvalidUrl(_) | RemoteError::JsonParse(_) | RemoteError::Base64(_)) => {
            StoryError::InvalidResponse {
                message: e.to_string(),
            }
        }
    }
}

fn to_fetch_error(err: RemoteError) -> FetchError {
    match err {
        RemoteError::ApiRequestFailed { status, url } => FetchError::Service {
            status,
            message: url,
        },
        RemoteError::Network(e) => FetchError::Network {
            message: e.to_string(),
        },
        RemoteError::InvalidResponse { message } => FetchError::InvalidResponse { message },
        e @ (RemoteError::InvalidUrl(_) | RemoteError::JsonParse(_) | RemoteError::Base64(_)) => {
            FetchError::InvalidResponse {
                message: e.to_string(),
            }
        }
    }
}

// ============================================================================
// Port Implementations
// ============================================================================

#[async_trait]
impl<B: HttpBackend> StoryGeneratorPort for StoryServiceClient<B> {
    async fn generate(&self, request: &StoryRequest) -> Result<Story, StoryError> {
        request.validate()?;
        self.generate_story(request).await.map_err(to_story_error)
    }
}

#[async_trait]
impl<B: HttpBackend> SpeechSynthesisPort for StoryServiceClient<B> {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio, FetchError> {
        StoryServiceClient::synthesize(self, request)
            .await
            .map_err(to_fetch_error)
    }

    async fn download(&self, reference: &str) -> Result<Vec<u8>, FetchError> {
        StoryServiceClient::download(self, reference)
            .await
            .map_err(to_fetch_error)
    }
}
