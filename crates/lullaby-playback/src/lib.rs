#![doc = include_str!("../README.md")]

pub mod ambience;
pub mod audio_io;
pub mod cache;
pub mod controller;
pub mod error;
pub mod projector;
pub mod session;

#[cfg(feature = "local-audio")]
pub mod audio_local;
#[cfg(feature = "local-audio")]
pub mod audio_thread;

// Re-export key types for convenience
pub use ambience::{AmbienceChannel, AmbienceDriver};
pub use audio_io::{AmbienceOutput, EngineStatus, NarrationOutput};
pub use cache::{AudioCache, DEFAULT_AUDIO_EXTENSION};
pub use controller::{
    ControllerConfig, ControllerDeps, DEFAULT_AMBIENCE_SHUTDOWN_GRACE, DEFAULT_POLL_INTERVAL,
    PlaybackController, PlaybackView,
};
pub use error::{EngineError, PlaybackError};
pub use projector::highlight_cursor;
pub use session::{Generation, PlaybackEvent, PlaybackSession, PollOutcome};
