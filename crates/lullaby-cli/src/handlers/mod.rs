//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Turn CLI arguments into core types, call the ports or the playback
//!   controller, format output for the terminal.
//! - Errors that map to a specific exit code are raised as [`CliError`].

pub mod listen;
pub mod narrate;
pub mod paths;
pub mod tell;

use lullaby_core::{NarrationSettings, SettingsStore};

use crate::commands::{NarrationArgs, StoryArgs};
use crate::error::CliError;

/// Column width used when printing story text.
pub const WRAP_WIDTH: usize = 72;

/// Settings for one invocation: defaults overridden by the command line.
pub fn narration_settings(
    story: &StoryArgs,
    narration: &NarrationArgs,
) -> Result<SettingsStore, CliError> {
    let mut settings = NarrationSettings::default();
    story.apply(&mut settings);
    settings.merge(&narration.settings_update());
    Ok(SettingsStore::new(settings)?)
}
