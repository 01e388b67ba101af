//! Wire types and internal configuration for the story service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::RemoteClientConfig;
use crate::error::{RemoteError, RemoteResult};

// ============================================================================
// Internal Configuration
// ============================================================================

/// Validated client configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_retries: u8,
    pub retry_base_delay_ms: u64,
}

impl TryFrom<&RemoteClientConfig> for ServiceConfig {
    type Error = RemoteError;

    fn try_from(config: &RemoteClientConfig) -> RemoteResult<Self> {
        #[allow(clippy::cast_possible_truncation)] // Duration milliseconds won't exceed u64 in practice
        let retry_base_delay_ms = config.retry_base_delay.as_millis() as u64;

        Ok(Self {
            base_url: Url::parse(&config.base_url)?,
            user_agent: config.user_agent.clone(),
            timeout: config.timeout,
            max_retries: config.max_retries,
            retry_base_delay_ms,
        })
    }
}

// ============================================================================
// Story Generation
// ============================================================================

/// Body of `POST /generate_story`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateStoryBody<'a> {
    pub user_input: &'a str,
    pub child_age: &'a str,
    pub story_duration: &'a str,
}

/// Reply of `POST /generate_story`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateStoryReply {
    pub story: String,
}

// ============================================================================
// Speech Synthesis
// ============================================================================

/// Body of `POST /tts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TtsBody<'a> {
    pub story_text: &'a str,
    pub voice: &'a str,
}

/// JSON reply of `POST /tts`. Exactly one field is expected to be set;
/// they are checked in declaration order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtsJsonReply {
    #[serde(default)]
    pub audio_base64: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}
