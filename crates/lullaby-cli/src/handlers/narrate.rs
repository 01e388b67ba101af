//! Narrate command handler: read aloud a story from a text file.

use std::path::Path;

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::commands::{NarrationArgs, StoryArgs};
use crate::error::CliError;
use crate::handlers::listen::{self, AudioOutputs};
use crate::handlers::narration_settings;

/// Read `file` as story text. Leading and trailing whitespace is dropped.
pub async fn read_story(file: &Path) -> Result<String, CliError> {
    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| CliError::Io(format!("{}: {e}", file.display())))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(CliError::Arguments(format!(
            "{} contains no story text",
            file.display()
        )));
    }
    Ok(text.to_string())
}

/// Execute the narrate command.
pub async fn execute(ctx: &CliContext, file: &Path, narration: NarrationArgs) -> Result<()> {
    let story = read_story(file).await?;
    let settings = narration_settings(&StoryArgs::default(), &narration)?;
    let outputs = AudioOutputs::open()?;

    eprintln!(
        "Narrating {} ({} words)",
        file.display(),
        story.split_whitespace().count()
    );
    listen::narrate(ctx, &story, settings, outputs, narration.ambience_asset).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_read_story_trims() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("story.txt");
        std::fs::write(&path, "\n  The owl yawned.\n\n").unwrap();

        assert_eq!(read_story(&path).await.unwrap(), "The owl yawned.");
    }

    #[tokio::test]
    async fn test_empty_file_is_a_usage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "  \n").unwrap();

        let err = read_story(&path).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = read_story(&dir.path().join("nope.txt")).await.unwrap_err();
        assert_eq!(err.exit_code(), 74);
    }
}
