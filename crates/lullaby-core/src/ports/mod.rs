//! Port definitions (trait abstractions) for the remote services.
//!
//! Ports use only domain types. The HTTP implementation lives in
//! `lullaby-remote`; tests substitute in-memory fakes.

pub mod story;
pub mod synthesis;

pub use story::{StoryError, StoryGeneratorPort};
pub use synthesis::{FetchError, SpeechSynthesisPort, SynthesisRequest, SynthesizedAudio};
