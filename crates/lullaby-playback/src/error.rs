//! Playback engine error types.

use lullaby_core::{FailureReason, FetchError};

/// Errors reported by a device audio output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Failed to open the audio output device.
    #[error("Failed to open audio output: {0}")]
    Output(String),

    /// The device could not open or decode the audio file.
    #[error("Failed to load audio: {0}")]
    Load(String),

    /// A play/pause/seek/volume call was rejected.
    #[error("Audio transport call failed: {0}")]
    Transport(String),

    /// No track is loaded.
    #[error("No audio is loaded")]
    NotLoaded,

    /// The audio thread has exited.
    #[error("Audio thread died unexpectedly")]
    AudioThreadDied,
}

/// Errors surfaced by the playback engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// Network, service or storage failure while retrieving narration audio.
    #[error("Could not fetch narration: {0}")]
    FetchFailed(#[from] FetchError),

    /// The device rejected the fetched audio.
    #[error("Could not open narration audio: {0}")]
    EngineLoadFailed(EngineError),

    /// The device rejected a transport call on a loaded track.
    #[error("Audio device error: {0}")]
    EngineFailed(EngineError),

    /// The ambience asset could not be started. Never fatal to narration.
    #[error("Could not start ambience: {0}")]
    AmbienceLoadFailed(EngineError),

    /// The device rejected a live ambience volume change. Never fatal.
    #[error("Could not change ambience volume: {0}")]
    AmbienceVolumeFailed(EngineError),

    /// A result from a superseded fetch or poll.
    #[error("Result belongs to a superseded narration attempt")]
    StaleCompletion,

    /// No story is open on the controller.
    #[error("No story is open")]
    NoStory,

    /// The requested transport call needs a loaded track.
    #[error("Narration is not loaded")]
    NotLoaded,

    /// The controller task has exited.
    #[error("Playback controller is closed")]
    ControllerClosed,
}

impl PlaybackError {
    /// The failure reason to publish, for errors that end in `Failed`.
    #[must_use]
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::FetchFailed(e) => Some(FailureReason::FetchFailed {
                message: e.to_string(),
            }),
            Self::EngineLoadFailed(e) => Some(FailureReason::EngineLoadFailed {
                message: e.to_string(),
            }),
            Self::EngineFailed(e) => Some(FailureReason::EngineFailed {
                message: e.to_string(),
            }),
            _ => None,
        }
    }
}
