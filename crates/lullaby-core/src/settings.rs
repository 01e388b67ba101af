//! Narration settings, validation and the observable settings store.
//!
//! The presentation layer owns the settings form; the playback engine only
//! observes. [`SettingsStore`] is passed to the controller explicitly and
//! changes are pushed to subscribers rather than polled.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::domain::{ChildAge, StoryLength};

/// Default narrator voice.
pub const DEFAULT_VOICE: &str = "en";

/// Default ambience loop volume.
pub const DEFAULT_AMBIENCE_VOLUME: f32 = 0.4;

/// Live narration configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSettings {
    /// Narrator voice identifier passed to the TTS service.
    pub voice: String,

    /// Whether the ambience loop plays under the narration.
    pub ambience_enabled: bool,

    /// Ambience volume in `[0, 1]`.
    pub ambience_volume: f32,

    pub child_age: ChildAge,

    pub story_length: StoryLength,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            ambience_enabled: true,
            ambience_volume: DEFAULT_AMBIENCE_VOLUME,
            child_age: ChildAge::default(),
            story_length: StoryLength::default(),
        }
    }
}

impl NarrationSettings {
    /// Apply the fields set in `update`.
    pub fn merge(&mut self, update: &SettingsUpdate) {
        if let Some(ref voice) = update.voice {
            self.voice.clone_from(voice);
        }
        if let Some(enabled) = update.ambience_enabled {
            self.ambience_enabled = enabled;
        }
        if let Some(volume) = update.ambience_volume {
            self.ambience_volume = volume;
        }
        if let Some(age) = update.child_age {
            self.child_age = age;
        }
        if let Some(length) = update.story_length {
            self.story_length = length;
        }
    }
}

/// Partial settings update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub voice: Option<String>,
    pub ambience_enabled: Option<bool>,
    pub ambience_volume: Option<f32>,
    pub child_age: Option<ChildAge>,
    pub story_length: Option<StoryLength>,
}

impl SettingsUpdate {
    #[must_use]
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    #[must_use]
    pub const fn ambience_enabled(mut self, enabled: bool) -> Self {
        self.ambience_enabled = Some(enabled);
        self
    }

    #[must_use]
    pub const fn ambience_volume(mut self, volume: f32) -> Self {
        self.ambience_volume = Some(volume);
        self
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Narrator voice cannot be empty")]
    EmptyVoice,

    #[error("Ambience volume must be between 0 and 1, got {0}")]
    InvalidVolume(f32),
}

/// Validate settings values.
pub fn validate_settings(settings: &NarrationSettings) -> Result<(), SettingsError> {
    if settings.voice.trim().is_empty() {
        return Err(SettingsError::EmptyVoice);
    }

    // `contains` is false for NaN as well.
    if !(0.0..=1.0).contains(&settings.ambience_volume) {
        return Err(SettingsError::InvalidVolume(settings.ambience_volume));
    }

    Ok(())
}

/// Observable, injectable settings.
///
/// Cloning shares the same underlying channel.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    tx: Arc<watch::Sender<NarrationSettings>>,
}

impl SettingsStore {
    /// Create a store holding `initial`, validating it first.
    pub fn new(initial: NarrationSettings) -> Result<Self, SettingsError> {
        validate_settings(&initial)?;
        let (tx, _rx) = watch::channel(initial);
        Ok(Self { tx: Arc::new(tx) })
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn current(&self) -> NarrationSettings {
        self.tx.borrow().clone()
    }

    /// Receiver notified whenever the settings change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NarrationSettings> {
        self.tx.subscribe()
    }

    /// Validate and apply `update`.
    ///
    /// Subscribers are notified only if a value actually changed. Returns the
    /// settings now in effect.
    pub fn update(&self, update: &SettingsUpdate) -> Result<NarrationSettings, SettingsError> {
        let mut candidate = self.current();
        candidate.merge(update);
        validate_settings(&candidate)?;

        let changed = self.tx.send_if_modified(|current| {
            if *current == candidate {
                false
            } else {
                current.clone_from(&candidate);
                true
            }
        });
        if changed {
            debug!(
                voice = %candidate.voice,
                ambience_enabled = candidate.ambience_enabled,
                ambience_volume = candidate.ambience_volume,
                "Narration settings updated"
            );
        }
        Ok(candidate)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(NarrationSettings::default());
        Self { tx: Arc::new(tx) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = NarrationSettings::default();
        assert_eq!(settings.voice, "en");
        assert!(settings.ambience_enabled);
        assert!((settings.ambience_volume - 0.4).abs() < f32::EPSILON);
        assert_eq!(settings.child_age, ChildAge::FiveToEight);
        assert_eq!(settings.story_length, StoryLength::Short);
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_validate_volume_out_of_range() {
        for volume in [-0.1, 1.5, f32::NAN] {
            let settings = NarrationSettings {
                ambience_volume: volume,
                ..Default::default()
            };
            assert!(matches!(
                validate_settings(&settings),
                Err(SettingsError::InvalidVolume(_))
            ));
        }
    }

    #[test]
    fn test_validate_empty_voice() {
        let settings = NarrationSettings {
            voice: "  ".into(),
            ..Default::default()
        };
        assert_eq!(validate_settings(&settings), Err(SettingsError::EmptyVoice));
    }

    #[test]
    fn test_merge_only_touches_set_fields() {
        let mut settings = NarrationSettings::default();
        settings.merge(&SettingsUpdate::default().ambience_volume(0.8));
        assert!((settings.ambience_volume - 0.8).abs() < f32::EPSILON);
        assert_eq!(settings.voice, DEFAULT_VOICE);
        assert!(settings.ambience_enabled);
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let settings: NarrationSettings = serde_json::from_str(r#"{"voice":"fr"}"#).unwrap();
        assert_eq!(settings.voice, "fr");
        assert!(settings.ambience_enabled);
    }

    #[tokio::test]
    async fn test_store_notifies_on_change() {
        let store = SettingsStore::default();
        let mut rx = store.subscribe();

        store
            .update(&SettingsUpdate::default().ambience_enabled(false))
            .unwrap();

        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().ambience_enabled);
    }

    #[test]
    fn test_store_skips_notification_when_unchanged() {
        let store = SettingsStore::default();
        let rx = store.subscribe();

        store.update(&SettingsUpdate::default().voice("en")).unwrap();

        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_store_rejects_invalid_update() {
        let store = SettingsStore::default();
        let rx = store.subscribe();

        let result = store.update(&SettingsUpdate::default().ambience_volume(2.0));

        assert!(matches!(result, Err(SettingsError::InvalidVolume(_))));
        assert!(!rx.has_changed().unwrap());
        assert!((store.current().ambience_volume - DEFAULT_AMBIENCE_VOLUME).abs() < f32::EPSILON);
    }
}
