//! Subcommands and their shared argument groups.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Subcommand};
use lullaby_core::{ChildAge, NarrationSettings, SettingsUpdate, StoryLength};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Generate a bedtime story and print it
    Tell {
        /// What the story should be about
        prompt: String,

        #[command(flatten)]
        story: StoryArgs,

        /// Narrate the story once it has been written
        #[arg(short, long)]
        listen: bool,

        #[command(flatten)]
        narration: NarrationArgs,
    },

    /// Narrate a story read from a text file
    Narrate {
        /// Path to a plain-text story
        file: PathBuf,

        #[command(flatten)]
        narration: NarrationArgs,
    },

    /// Show resolved data and cache directories
    Paths,
}

/// Story request options.
#[derive(Debug, Clone, Default, Args)]
pub struct StoryArgs {
    /// Age range of the listener: 3-5, 5-8 or 8-10
    #[arg(long, value_parser = ChildAge::from_str)]
    pub age: Option<ChildAge>,

    /// Story length: 5-10, 15-30 or 30-60 minutes
    #[arg(long, value_parser = StoryLength::from_str)]
    pub length: Option<StoryLength>,
}

/// Narration options shared by `tell --listen` and `narrate`.
#[derive(Debug, Clone, Default, Args)]
pub struct NarrationArgs {
    /// Narrator voice passed to the speech service
    #[arg(long)]
    pub voice: Option<String>,

    /// Do not play the ambience loop under the narration
    #[arg(long)]
    pub no_ambience: bool,

    /// Ambience volume between 0 and 1
    #[arg(long)]
    pub ambience_volume: Option<f32>,

    /// Ambience track to loop under the narration
    #[arg(long, env = "LULLABY_AMBIENCE_ASSET")]
    pub ambience_asset: Option<PathBuf>,
}

impl NarrationArgs {
    /// The settings changes requested on the command line.
    pub fn settings_update(&self) -> SettingsUpdate {
        let mut update = SettingsUpdate::default();
        if let Some(voice) = &self.voice {
            update = update.voice(voice.trim());
        }
        if self.no_ambience {
            update = update.ambience_enabled(false);
        }
        if let Some(volume) = self.ambience_volume {
            update = update.ambience_volume(volume);
        }
        update
    }
}

impl StoryArgs {
    /// Apply the requested age and length to `settings`.
    pub fn apply(&self, settings: &mut NarrationSettings) {
        if let Some(age) = self.age {
            settings.child_age = age;
        }
        if let Some(length) = self.length {
            settings.story_length = length;
        }
    }
}
