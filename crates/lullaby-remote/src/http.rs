//! HTTP backend abstraction for the story service.
//!
//! The client is generic over [`HttpBackend`] so it can be tested against
//! canned replies. The production implementation uses reqwest with automatic
//! retry for transient errors.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::{RemoteError, RemoteResult};
use crate::models::ServiceConfig;

// ============================================================================
// Reply
// ============================================================================

/// A successful HTTP reply: content type and raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn new(content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// Whether the body is encoded audio rather than a JSON document.
    pub fn is_audio(&self) -> bool {
        self.content_type.as_deref().is_some_and(|content_type| {
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            mime.starts_with("audio/") || mime == "application/octet-stream"
        })
    }

    pub fn parse_json<T: DeserializeOwned>(&self) -> RemoteResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

// ============================================================================
// HTTP Backend Trait
// ============================================================================

/// Trait for HTTP backends used by the story service client.
///
/// This is an implementation detail; external code goes through the core
/// port traits.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// POST a JSON body.
    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> RemoteResult<HttpReply>;

    /// GET a resource.
    async fn get(&self, url: &Url) -> RemoteResult<HttpReply>;
}

// ============================================================================
// Reqwest Backend
// ============================================================================

/// Production HTTP backend using reqwest with retry logic.
///
/// Server errors (5xx) and network errors are retried with exponential
/// backoff; client errors (4xx) fail immediately.
pub struct ReqwestBackend {
    client: reqwest::Client,
    max_retries: u8,
    retry_base_delay_ms: u64,
}

impl ReqwestBackend {
    pub fn new(config: &ServiceConfig) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
        })
    }

    /// Send the request produced by `build`, retrying transient errors.
    async fn send_with_retry<F>(&self, url: &Url, build: F) -> RemoteResult<HttpReply>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut last_error: Option<RemoteError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_base_delay_ms, attempt);
                warn!(
                    url = %url,
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = ?last_error.as_ref().map(ToString::to_string),
                    "Retrying story service request"
                );
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return read_reply(response).await;
                    }

                    let error = RemoteError::ApiRequestFailed {
                        status: status.as_u16(),
                        url: url.to_string(),
                    };

                    // 5xx errors are retryable (server-side issues)
                    if status.is_server_error() && attempt < self.max_retries {
                        last_error = Some(error);
                        continue;
                    }

                    // 4xx errors or final attempt - fail immediately
                    return Err(error);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        last_error = Some(e.into());
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RemoteError::invalid("unknown error during request")))
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`.
fn backoff_delay(base_ms: u64, attempt: u8) -> Duration {
    let exponent = u32::from(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(exponent)))
}

async fn read_reply(response: reqwest::Response) -> RemoteResult<HttpReply> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await?.to_vec();
    debug!(content_type = ?content_type, bytes = body.len(), "Story service replied");

    Ok(HttpReply::new(content_type.as_deref(), body))
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn post_json(&self, url: &Url, body: &serde_json::Value) -> RemoteResult<HttpReply> {
        self.send_with_retry(url, || self.client.post(url.as_str()).json(body))
            .await
    }

    async fn get(&self, url: &Url) -> RemoteResult<HttpReply> {
        self.send_with_retry(url, || self.client.get(url.as_str()))
            .await
    }
}

// ============================================================================
// Fake Backend for Testing
// ============================================================================

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Canned outcome for a URL.
    #[derive(Clone)]
    pub enum CannedReply {
        Ok(HttpReply),
        Status(u16),
    }

    impl CannedReply {
        pub fn json(value: &serde_json::Value) -> Self {
            Self::Ok(HttpReply::new(
                Some("application/json"),
                serde_json::to_vec(value).unwrap(),
            ))
        }

        pub fn audio(bytes: &[u8]) -> Self {
            Self::Ok(HttpReply::new(Some("audio/mpeg"), bytes))
        }
    }

    /// A request the fake backend received.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Recorded {
        pub method: &'static str,
        pub url: String,
        pub body: Option<serde_json::Value>,
    }

    /// A fake HTTP backend that returns canned replies by URL substring.
    #[derive(Default)]
    pub struct FakeBackend {
        replies: Vec<(String, CannedReply)>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_reply(mut self, url_contains: &str, reply: CannedReply) -> Self {
            self.replies.push((url_contains.to_string(), reply));
            self
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        fn answer(&self, recorded: Recorded) -> RemoteResult<HttpReply> {
            let url = recorded.url.clone();
            self.requests.lock().unwrap().push(recorded);

            let reply = self
                .replies
                .iter()
                .find(|(pattern, _)| url.contains(pattern.as_str()))
                .map(|(_, reply)| reply.clone());

            match reply {
                Some(CannedReply::Ok(reply)) => Ok(reply),
                Some(CannedReply::Status(status)) => {
                    Err(RemoteError::ApiRequestFailed { status, url })
                }
                None => Err(RemoteError::ApiRequestFailed { status: 404, url }),
            }
        }
    }

    #[async_trait]
    impl HttpBackend for FakeBackend {
        async fn post_json(&self, url: &Url, body: &serde_json::Value) -> RemoteResult<HttpReply> {
            self.answer(Recorded {
                method: "POST",
                url: url.to_string(),
                body: Some(body.clone()),
            })
        }

        async fn get(&self, url: &Url) -> RemoteResult<HttpReply> {
            self.answer(Recorded {
                method: "GET",
                url: url.to_string(),
                body: None,
            })
        }
    }
}
