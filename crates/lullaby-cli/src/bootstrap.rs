//! CLI bootstrap - the composition root.
//!
//! The remote story client is built here and handed to handlers as the
//! core port traits. Device audio is opened later, only by commands that
//! narrate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lullaby_core::{
    SpeechSynthesisPort, StoryGeneratorPort, cache_dir_under, data_root, ensure_directory,
};
use lullaby_remote::{DefaultStoryClient, RemoteClientConfig};
use tracing::debug;

use crate::error::CliError;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Story service base URL; `None` uses the built-in default.
    pub api_url: Option<String>,
    /// Root of the application data directory.
    pub data_root: PathBuf,
}

impl CliConfig {
    /// Create config with the resolved data root.
    pub fn with_defaults() -> Result<Self, CliError> {
        Ok(Self {
            api_url: None,
            data_root: data_root()?,
        })
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        self.api_url = api_url.filter(|url| !url.trim().is_empty());
        self
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub generator: Arc<dyn StoryGeneratorPort>,
    pub synthesis: Arc<dyn SpeechSynthesisPort>,
    pub data_root: PathBuf,
}

impl CliContext {
    /// Directory holding narration cache slots.
    pub fn cache_dir(&self) -> PathBuf {
        cache_dir_under(&self.data_root)
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }
}

/// Build the CLI context: remote client plus a ready audio cache directory.
pub fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let mut remote = RemoteClientConfig::new();
    if let Some(url) = &config.api_url {
        remote = remote.with_base_url(url.trim());
    }

    let client = DefaultStoryClient::new(&remote)
        .map_err(|e| CliError::Config(format!("story service client: {e}")))?;
    debug!(base_url = %client.base_url(), "Story service client ready");
    let client = Arc::new(client);

    ensure_directory(&cache_dir_under(&config.data_root))?;

    Ok(CliContext {
        generator: client.clone(),
        synthesis: client,
        data_root: config.data_root,
    })
}
