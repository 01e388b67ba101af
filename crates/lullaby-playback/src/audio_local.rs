//! Local (rodio) adapters for [`NarrationOutput`] and [`AmbienceOutput`].
//!
//! Both adapters share a single `Arc<AudioThreadHandle>`: one audio OS thread
//! owns the output stream and both sinks.
//!
//! ```no_run
//! # use lullaby_playback::audio_local::new_pair;
//! # use lullaby_playback::EngineError;
//! let (narration, ambience) = new_pair()?;
//! # Ok::<(), EngineError>(())
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use lullaby_core::CachedAudioHandle;

use crate::audio_io::{AmbienceOutput, EngineStatus, NarrationOutput};
use crate::audio_thread::AudioThreadHandle;
use crate::error::EngineError;

/// Narration output on the local audio device.
pub struct LocalNarrationOutput {
    handle: Arc<AudioThreadHandle>,
}

#[async_trait]
impl NarrationOutput for LocalNarrationOutput {
    async fn load(&self, handle: &CachedAudioHandle) -> Result<u64, EngineError> {
        self.handle.load(handle.path()).await
    }

    async fn play(&self) -> Result<(), EngineError> {
        self.handle.play().await
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.handle.pause().await
    }

    async fn seek(&self, position_ms: u64) -> Result<(), EngineError> {
        self.handle.seek(position_ms).await
    }

    async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.handle.status().await
    }

    async fn unload(&self) -> Result<(), EngineError> {
        self.handle.unload().await
    }
}

/// Ambience output on the local audio device.
pub struct LocalAmbienceOutput {
    handle: Arc<AudioThreadHandle>,
}

#[async_trait]
impl AmbienceOutput for LocalAmbienceOutput {
    async fn start_loop(&self, asset: &Path, volume: f32) -> Result<(), EngineError> {
        self.handle.start_ambience(asset, volume).await
    }

    async fn set_volume(&self, volume: f32) -> Result<(), EngineError> {
        self.handle.set_ambience_volume(volume).await
    }

    async fn stop_loop(&self) -> Result<(), EngineError> {
        self.handle.stop_ambience().await
    }
}

/// Spawn one [`AudioThreadHandle`] and return narration/ambience outputs
/// sharing it.
pub fn new_pair() -> Result<(LocalNarrationOutput, LocalAmbienceOutput), EngineError> {
    let handle = Arc::new(AudioThreadHandle::spawn()?);
    Ok((
        LocalNarrationOutput {
            handle: Arc::clone(&handle),
        },
        LocalAmbienceOutput { handle },
    ))
}
