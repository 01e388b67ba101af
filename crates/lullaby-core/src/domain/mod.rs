//! Domain types for story narration.
//!
//! - `story` - what the user asks for and the text that comes back
//! - `session` - identity of one narration attempt and its cache key
//! - `playback` - playback/ambience state published to the presentation layer

mod playback;
mod session;
mod story;

pub use playback::{AmbienceState, CachedAudioHandle, FailureReason, PlaybackState, ProgressSample};
pub use session::{CacheKey, SessionId, StorySession};
pub use story::{ChildAge, Story, StoryLength, StoryRequest};
