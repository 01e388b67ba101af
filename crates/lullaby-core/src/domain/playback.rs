//! Playback and ambience state as seen by the presentation layer.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::session::CacheKey;

/// A playable, locally stored narration track.
///
/// Produced by the audio cache once the synthesized bytes are on disk. The
/// playback session only borrows the file; it never deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAudioHandle {
    key: CacheKey,
    path: PathBuf,
    len: u64,
}

impl CachedAudioHandle {
    #[must_use]
    pub const fn new(key: CacheKey, path: PathBuf, len: u64) -> Self {
        Self { key, path, len }
    }

    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the slot file in bytes.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Why a narration attempt ended in [`PlaybackState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Network, service or storage failure while retrieving the audio.
    FetchFailed { message: String },
    /// Audio bytes were fetched but the device could not open them.
    EngineLoadFailed { message: String },
    /// The device rejected a transport call on a loaded track.
    EngineFailed { message: String },
}

impl FailureReason {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::FetchFailed { message }
            | Self::EngineLoadFailed { message }
            | Self::EngineFailed { message } => message,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed { message } => write!(f, "could not fetch narration: {message}"),
            Self::EngineLoadFailed { message } => {
                write!(f, "could not open narration audio: {message}")
            }
            Self::EngineFailed { message } => write!(f, "audio device error: {message}"),
        }
    }
}

/// Narration state machine.
///
/// Exactly one value is live per session. `Finished` and `Failed` are not
/// terminal: `start`/`restart` leave them again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Fetching,
    Loaded {
        handle: CachedAudioHandle,
    },
    Playing {
        position_ms: u64,
        duration_ms: u64,
    },
    Paused {
        position_ms: u64,
        duration_ms: u64,
    },
    Finished {
        duration_ms: u64,
    },
    Failed {
        reason: FailureReason,
    },
}

impl PlaybackState {
    /// Whether a track is open on the device.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(
            self,
            Self::Loaded { .. } | Self::Playing { .. } | Self::Paused { .. }
        )
    }

    #[must_use]
    pub const fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    /// `(position_ms, duration_ms)` if the state carries progress.
    #[must_use]
    pub const fn progress(&self) -> Option<(u64, u64)> {
        match *self {
            Self::Playing {
                position_ms,
                duration_ms,
            }
            | Self::Paused {
                position_ms,
                duration_ms,
            } => Some((position_ms, duration_ms)),
            Self::Finished { duration_ms } => Some((duration_ms, duration_ms)),
            _ => None,
        }
    }

    /// Short lowercase name, used in logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Loaded { .. } => "loaded",
            Self::Playing { .. } => "playing",
            Self::Paused { .. } => "paused",
            Self::Finished { .. } => "finished",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ambience loop state. Independent of [`PlaybackState`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AmbienceState {
    #[default]
    Stopped,
    Looping {
        volume: f32,
    },
}

impl AmbienceState {
    #[must_use]
    pub const fn is_looping(&self) -> bool {
        matches!(self, Self::Looping { .. })
    }

    #[must_use]
    pub const fn volume(&self) -> Option<f32> {
        match *self {
            Self::Looping { volume } => Some(volume),
            Self::Stopped => None,
        }
    }
}

/// A progress report from the audio engine.
///
/// `duration_ms` is 0 until the engine knows the track length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl ProgressSample {
    #[must_use]
    pub const fn new(position_ms: u64, duration_ms: u64) -> Self {
        Self {
            position_ms,
            duration_ms,
        }
    }

    /// Position clamped into `[0, duration]` once the duration is known.
    #[must_use]
    pub const fn clamped(self) -> Self {
        if self.duration_ms > 0 && self.position_ms > self.duration_ms {
            Self::new(self.duration_ms, self.duration_ms)
        } else {
            self
        }
    }
}
