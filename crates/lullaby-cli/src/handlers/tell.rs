//! Tell command handler: generate a story, print it, optionally narrate it.

use anyhow::Result;
use lullaby_core::StoryRequest;
use tracing::info;

use crate::bootstrap::CliContext;
use crate::commands::{NarrationArgs, StoryArgs};
use crate::error::CliError;
use crate::handlers::listen::{self, AudioOutputs};
use crate::handlers::{WRAP_WIDTH, narration_settings};
use crate::presentation::wrap_text;

/// Arguments of `lullaby tell`.
#[derive(Debug, Clone)]
pub struct TellArgs {
    pub prompt: String,
    pub story: StoryArgs,
    pub listen: bool,
    pub narration: NarrationArgs,
}

/// Execute the tell command.
///
/// With `--listen` the audio device is opened before the story is requested,
/// so a build without audio fails without a service round trip.
pub async fn execute(ctx: &CliContext, args: TellArgs) -> Result<()> {
    let settings = narration_settings(&args.story, &args.narration)?;
    let outputs = if args.listen {
        Some(AudioOutputs::open()?)
    } else {
        None
    };

    let current = settings.current();
    let request = StoryRequest::new(args.prompt, current.child_age, current.story_length);
    request.validate().map_err(CliError::from)?;

    eprintln!(
        "Writing a {} story for ages {}...",
        current.story_length, current.child_age
    );
    let story = ctx.generator.generate(&request).await.map_err(CliError::from)?;
    info!(words = story.word_count(), "Story written");

    println!("{}\n", wrap_text(story.text(), WRAP_WIDTH));

    if let Some(outputs) = outputs {
        listen::narrate(
            ctx,
            story.text(),
            settings,
            outputs,
            args.narration.ambience_asset,
        )
        .await?;
    }
    Ok(())
}
