//! Client for the story service.

use lullaby_core::{Story, StoryRequest, SynthesisRequest, SynthesizedAudio};
use tracing::{debug, info};
use url::Url;

use crate::config::RemoteClientConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::http::{HttpBackend, ReqwestBackend};
use crate::models::{GenerateStoryBody, ServiceConfig, TtsBody};
use crate::parsing::{parse_story_reply, parse_tts_reply};
use crate::url::{GENERATE_STORY_ENDPOINT, TTS_ENDPOINT, build_endpoint_url};

/// Default client using the reqwest HTTP backend.
pub type DefaultStoryClient = StoryServiceClient<ReqwestBackend>;

/// Client for the story-generation and speech-synthesis endpoints.
///
/// Generic over the HTTP backend so it can be tested with canned replies.
/// Use [`DefaultStoryClient`] in production code.
pub struct StoryServiceClient<B: HttpBackend> {
    pub(crate) backend: B,
    pub(crate) config: ServiceConfig,
}

impl DefaultStoryClient {
    /// Create a client. Fails on an unparsable base URL or when the HTTP
    /// client cannot be built.
    pub fn new(config: &RemoteClientConfig) -> RemoteResult<Self> {
        let config = ServiceConfig::try_from(config)?;
        let backend = ReqwestBackend::new(&config)?;
        Ok(Self { backend, config })
    }
}

impl<B: HttpBackend> StoryServiceClient<B> {
    #[cfg(test)]
    pub(crate) const fn with_backend(config: ServiceConfig, backend: B) -> Self {
        Self { backend, config }
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Ask the service to write a story.
    pub async fn generate_story(&self, request: &StoryRequest) -> RemoteResult<Story> {
        let url = build_endpoint_url(&self.config.base_url, GENERATE_STORY_ENDPOINT);
        let body = serde_json::to_value(GenerateStoryBody {
            user_input: request.prompt.trim(),
            child_age: request.child_age.label(),
            story_duration: request.story_length.label(),
        })?;

        info!(
            age = %request.child_age,
            length = %request.story_length,
            "Requesting story"
        );
        let reply = self.backend.post_json(&url, &body).await?;
        let story = parse_story_reply(&reply)?;
        debug!(words = story.word_count(), "Story received");
        Ok(story)
    }

    /// Ask the service to narrate a story text.
    pub async fn synthesize(&self, request: &SynthesisRequest) -> RemoteResult<SynthesizedAudio> {
        let url = build_endpoint_url(&self.config.base_url, TTS_ENDPOINT);
        let body = serde_json::to_value(TtsBody {
            story_text: &request.story_text,
            voice: &request.voice,
        })?;

        info!(voice = %request.voice, chars = request.story_text.len(), "Requesting narration");
        let reply = self.backend.post_json(&url, &body).await?;
        let audio = parse_tts_reply(reply, &self.config.base_url)?;
        debug!(audio = ?audio, "Narration reply");
        Ok(audio)
    }

    /// Download the audio behind a reference URL.
    pub async fn download(&self, reference: &str) -> RemoteResult<Vec<u8>> {
        let url = Url::parse(reference)?;
        debug!(url = %url, "Downloading narration audio");

        let reply = self.backend.get(&url).await?;
        if reply.body.is_empty() {
            return Err(RemoteError::invalid("downloaded audio is empty"));
        }
        Ok(reply.body)
    }
}
