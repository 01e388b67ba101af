//! CLI-specific error types and mappings.
//!
//! Handlers return `anyhow::Result`; errors that should pick a specific exit
//! code are raised as [`CliError`] and recovered with `downcast_ref` in
//! `main`.

use lullaby_core::{PathError, SettingsError, StoryError};
use lullaby_playback::PlaybackError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// The story service could not write a story.
    #[error("Could not generate a story: {0}")]
    Story(String),

    /// Narration failed.
    #[error("Narration failed: {0}")]
    Playback(String),

    /// Invalid arguments.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No usable audio output.
    #[error("Audio is unavailable: {0}")]
    AudioUnavailable(String),
}

impl CliError {
    /// Map error to an exit code (sysexits.h where one fits).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Story(_) | Self::Playback(_) => 1,
            Self::Arguments(_) => 2,         // EX_USAGE
            Self::Io(_) => 74,               // EX_IOERR
            Self::Config(_) => 78,           // EX_CONFIG
            Self::AudioUnavailable(_) => 69, // EX_UNAVAILABLE
        }
    }
}

impl From<StoryError> for CliError {
    fn from(err: StoryError) -> Self {
        match err {
            StoryError::EmptyPrompt => Self::Arguments(err.to_string()),
            other => Self::Story(other.to_string()),
        }
    }
}

impl From<PlaybackError> for CliError {
    fn from(err: PlaybackError) -> Self {
        Self::Playback(err.to_string())
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Arguments(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
