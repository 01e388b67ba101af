//! Public configuration for the story service client.

use std::time::Duration;

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "https://bedtime-story-api-tdhc.onrender.com";

/// Configuration for the story service client.
///
/// # Example
///
/// ```
/// use lullaby_remote::RemoteClientConfig;
/// use std::time::Duration;
///
/// let config = RemoteClientConfig::new()
///     .with_base_url("http://localhost:8000")
///     .with_timeout(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    pub(crate) base_url: String,
    pub(crate) user_agent: String,
    /// Per-request timeout. Story generation and synthesis are slow, so this
    /// is generous by default.
    pub(crate) timeout: Duration,
    pub(crate) max_retries: u8,
    pub(crate) retry_base_delay: Duration,
}

impl Default for RemoteClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("lullaby/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(90),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl RemoteClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service base URL.
    ///
    /// Defaults to [`DEFAULT_BASE_URL`].
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout. Defaults to 90 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries for transient errors. Defaults to 2.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base delay for exponential backoff. Defaults to 500ms.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
