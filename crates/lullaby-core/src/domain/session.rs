//! Narration session identity and cache keys.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier of one narration attempt.
///
/// Ids are assigned by the controller in increasing order; a new story or a
/// voice change always produces a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Deduplication key for synthesized audio, derived from (text, voice).
///
/// The same text narrated by the same voice always yields the same key, so a
/// cache slot written for it can be found again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Number of digest bytes kept in the key (hex encoded, so twice as many chars).
    const DIGEST_BYTES: usize = 16;

    /// Derive the key for `text` narrated by `voice`.
    #[must_use]
    pub fn derive(text: &str, voice: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(voice.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") cannot collide.
        hasher.update([0u8]);
        hasher.update(text.as_bytes());

        let mut hex = format!("{:x}", hasher.finalize());
        hex.truncate(Self::DIGEST_BYTES * 2);
        Self(hex)
    }

    /// Wrap an already derived key (e.g. one read back from a slot file name).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the cache slot for this key.
    #[must_use]
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One attempt to narrate a specific story text with a specific voice.
///
/// The text is immutable for the lifetime of the session. Changing the voice
/// does not mutate a session; it produces a new one via [`Self::with_voice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySession {
    id: SessionId,
    text: Arc<str>,
    voice: String,
    key: CacheKey,
}

impl StorySession {
    pub fn new(id: SessionId, text: impl Into<Arc<str>>, voice: impl Into<String>) -> Self {
        let text = text.into();
        let voice = voice.into();
        let key = CacheKey::derive(&text, &voice);
        Self {
            id,
            text,
            voice,
            key,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Number of whitespace-separated words in the text.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Same text under a new id and voice.
    #[must_use]
    pub fn with_voice(&self, id: SessionId, voice: impl Into<String>) -> Self {
        Self::new(id, Arc::clone(&self.text), voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_for_same_inputs() {
        let a = CacheKey::derive("Once upon a time", "en");
        let b = CacheKey::derive("Once upon a time", "en");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cache_key_is_leading_sha256_of_voice_and_text() {
        let key = CacheKey::derive("Once upon a time", "en");
        assert_eq!(key.as_str(), "2ce0defdd43ed9f0106d57ab5d84657c");
    }

    #[test]
    fn cache_key_changes_with_voice_or_text() {
        let base = CacheKey::derive("Once upon a time", "en");
        assert_ne!(base, CacheKey::derive("Once upon a time", "en-gb"));
        assert_ne!(base, CacheKey::derive("Once upon a time.", "en"));
    }

    #[test]
    fn cache_key_separates_voice_from_text() {
        assert_ne!(CacheKey::derive("c", "ab"), CacheKey::derive("bc", "a"));
    }

    #[test]
    fn slot_file_name_uses_key() {
        let key = CacheKey::from_raw("abc123");
        assert_eq!(key.file_name("mp3"), "abc123.mp3");
    }

    #[test]
    fn with_voice_rekeys_session() {
        let session = StorySession::new(SessionId::new(1), "The moon hums softly", "en");
        let other = session.with_voice(session.id().next(), "fr");

        assert_eq!(other.id(), SessionId::new(2));
        assert_eq!(other.text(), session.text());
        assert_ne!(other.key(), session.key());
        assert_eq!(other.word_count(), 4);
    }
}
