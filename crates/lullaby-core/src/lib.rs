#![doc = include_str!("../README.md")]

pub mod domain;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AmbienceState, CacheKey, CachedAudioHandle, ChildAge, FailureReason, PlaybackState,
    ProgressSample, SessionId, Story, StoryLength, StoryRequest, StorySession,
};
pub use paths::{PathError, audio_cache_dir, cache_dir_under, data_root, ensure_directory};
pub use ports::{
    FetchError, SpeechSynthesisPort, StoryError, StoryGeneratorPort, SynthesisRequest,
    SynthesizedAudio,
};
pub use settings::{
    DEFAULT_AMBIENCE_VOLUME, DEFAULT_VOICE, NarrationSettings, SettingsError, SettingsStore,
    SettingsUpdate, validate_settings,
};
