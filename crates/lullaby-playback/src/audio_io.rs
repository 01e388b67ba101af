//! `NarrationOutput` and `AmbienceOutput` trait abstractions for device audio.
//!
//! These traits decouple the playback engine from any specific audio backend:
//!
//! | Implementor | Where used |
//! |---|---|
//! | `LocalNarrationOutput` / `LocalAmbienceOutput` (feature `local-audio`) | CLI - rodio on the local machine |
//! | test fakes with a manual clock | integration tests |
//!
//! Both traits are object-safe and take `&self`; implementations use interior
//! mutability (channels, locks) for their state.

use std::path::Path;

use async_trait::async_trait;
use lullaby_core::CachedAudioHandle;

use crate::error::EngineError;

/// Status report of the narration track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatus {
    pub position_ms: u64,
    /// 0 while unknown.
    pub duration_ms: u64,
    /// True exactly once, on the first status after the track played to its end.
    pub did_just_finish: bool,
}

/// Narration channel of the device audio engine.
///
/// Holds at most one track. `load` replaces any previous track and leaves the
/// new one paused at position 0.
#[async_trait]
pub trait NarrationOutput: Send + Sync {
    /// Open the file behind `handle`. Returns the duration in ms (0 if unknown).
    async fn load(&self, handle: &CachedAudioHandle) -> Result<u64, EngineError>;

    async fn play(&self) -> Result<(), EngineError>;

    async fn pause(&self) -> Result<(), EngineError>;

    /// Move to an absolute position.
    async fn seek(&self, position_ms: u64) -> Result<(), EngineError>;

    async fn status(&self) -> Result<EngineStatus, EngineError>;

    /// Release the track. Succeeds when nothing is loaded.
    async fn unload(&self) -> Result<(), EngineError>;
}

/// Ambience channel of the device audio engine.
///
/// Independent of the narration channel; both share the one output device.
#[async_trait]
pub trait AmbienceOutput: Send + Sync {
    /// Start looping `asset` forever at `volume`, replacing any running loop.
    async fn start_loop(&self, asset: &Path, volume: f32) -> Result<(), EngineError>;

    /// Change the volume of the running loop without restarting it.
    async fn set_volume(&self, volume: f32) -> Result<(), EngineError>;

    /// Stop and release the loop. Succeeds when nothing is running.
    async fn stop_loop(&self) -> Result<(), EngineError>;
}
