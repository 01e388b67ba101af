//! Interactive narration: drives a `PlaybackController` from terminal input.
//!
//! Input arrives line by line on a channel. In production the lines come
//! from a dedicated stdin thread ([`stdin_lines`]); tests push them directly.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use lullaby_core::{PlaybackState, SettingsStore, SettingsUpdate};
use lullaby_playback::{
    AmbienceOutput, AudioCache, ControllerConfig, ControllerDeps, NarrationOutput,
    PlaybackController, PlaybackError, PlaybackView,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::render_progress;

const HELP: &str = "\
  p            pause
  r            resume
  s <seconds>  seek (s +15 / s -15 to jump)
  restart      play from the beginning
  a            toggle ambience
  v <0-1>      ambience volume
  q            quit";

// ============================================================================
// Input
// ============================================================================

/// A parsed line of listen-loop input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListenCommand {
    Pause,
    Resume,
    Seek(SeekTarget),
    Restart,
    ToggleAmbience,
    Volume(f32),
    Help,
    Quit,
}

/// Where a seek command points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    To(u64),
    Forward(u64),
    Back(u64),
}

impl SeekTarget {
    /// Absolute target given the position currently displayed.
    pub const fn resolve(self, current_ms: u64) -> u64 {
        match self {
            Self::To(ms) => ms,
            Self::Forward(ms) => current_ms.saturating_add(ms),
            Self::Back(ms) => current_ms.saturating_sub(ms),
        }
    }
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<ListenCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();

    let command = match word.to_ascii_lowercase().as_str() {
        "p" | "pause" => ListenCommand::Pause,
        "r" | "resume" | "play" => ListenCommand::Resume,
        "restart" => ListenCommand::Restart,
        "a" | "ambience" => ListenCommand::ToggleAmbience,
        "h" | "help" | "?" => ListenCommand::Help,
        "q" | "quit" | "exit" => ListenCommand::Quit,
        "s" | "seek" => ListenCommand::Seek(parse_seek(arg)?),
        "v" | "volume" => {
            let raw = arg.ok_or("usage: v <0-1>")?;
            let volume = raw
                .parse::<f32>()
                .map_err(|_| format!("not a volume: '{raw}'"))?;
            ListenCommand::Volume(volume)
        }
        other => return Err(format!("unknown command '{other}' (h for help)")),
    };
    Ok(Some(command))
}

fn parse_seek(arg: Option<&str>) -> Result<SeekTarget, String> {
    let raw = arg.ok_or("usage: s <seconds>")?;
    let (make, number): (fn(u64) -> SeekTarget, &str) = if let Some(rest) = raw.strip_prefix('+')
    {
        (SeekTarget::Forward, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (SeekTarget::Back, rest)
    } else {
        (SeekTarget::To, raw)
    };

    let seconds = number
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .ok_or_else(|| format!("not a number of seconds: '{raw}'"))?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ms = (seconds * 1000.0).round() as u64;
    Ok(make(ms))
}

/// Read stdin lines on a dedicated thread.
///
/// The thread is detached; it ends with the process or when the receiver is
/// dropped and another line arrives.
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("lullaby-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Could not read terminal input");
    }
    rx
}

// ============================================================================
// Audio outputs
// ============================================================================

/// Device audio the controller plays through.
pub struct AudioOutputs {
    pub narration: Arc<dyn NarrationOutput>,
    pub ambience: Arc<dyn AmbienceOutput>,
}

impl AudioOutputs {
    /// Open the local audio device.
    #[cfg(feature = "local-audio")]
    pub fn open() -> Result<Self, CliError> {
        let (narration, ambience) = lullaby_playback::audio_local::new_pair()
            .map_err(|e| CliError::AudioUnavailable(e.to_string()))?;
        Ok(Self {
            narration: Arc::new(narration),
            ambience: Arc::new(ambience),
        })
    }

    /// Open the local audio device.
    #[cfg(not(feature = "local-audio"))]
    pub fn open() -> Result<Self, CliError> {
        Err(CliError::AudioUnavailable(
            "this build has no audio output; rebuild with `--features local-audio`".to_string(),
        ))
    }
}

// ============================================================================
// Loop
// ============================================================================

/// Everything `run` needs besides the story and input.
pub struct ListenSetup {
    pub outputs: AudioOutputs,
    /// Track looped under the narration; `None` keeps ambience silent.
    pub ambience_asset: Option<PathBuf>,
    pub controller: ControllerConfig,
}

/// How a listen session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    Finished,
    Quit,
}

/// Narrate `story` with stdin controls.
pub async fn narrate(
    ctx: &CliContext,
    story: &str,
    settings: SettingsStore,
    outputs: AudioOutputs,
    ambience_asset: Option<PathBuf>,
) -> Result<()> {
    println!("Commands:\n{HELP}\n");
    let setup = ListenSetup {
        outputs,
        ambience_asset,
        controller: ControllerConfig::default(),
    };
    run(ctx, story, settings, setup, stdin_lines()).await?;
    Ok(())
}

/// Open `story` on a new controller, start it, and react to input until the
/// story finishes or the user quits. The controller is always shut down
/// before returning.
pub async fn run(
    ctx: &CliContext,
    story: &str,
    settings: SettingsStore,
    setup: ListenSetup,
    input: mpsc::UnboundedReceiver<String>,
) -> Result<ListenOutcome> {
    let cache = AudioCache::new(ctx.cache_dir(), Arc::clone(&ctx.synthesis));
    let controller = PlaybackController::spawn(
        ControllerDeps {
            cache,
            narration: setup.outputs.narration,
            ambience: setup.outputs.ambience,
            ambience_asset: setup.ambience_asset,
        },
        settings.clone(),
        setup.controller,
    );

    let words: Vec<&str> = story.split_whitespace().collect();
    let outcome = drive(&controller, &settings, story, &words, input).await;
    println!();
    controller.shutdown().await;
    outcome
}

async fn drive(
    controller: &PlaybackController,
    settings: &SettingsStore,
    story: &str,
    words: &[&str],
    mut input: mpsc::UnboundedReceiver<String>,
) -> Result<ListenOutcome> {
    let mut views = controller.subscribe();
    let session = controller.open_story(story).await.map_err(CliError::from)?;
    debug!(session = %session, words = words.len(), "Listening");
    controller.start().await.map_err(CliError::from)?;

    let mut screen = Screen::default();
    let mut input_open = true;

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Err(CliError::from(PlaybackError::ControllerClosed).into());
                }
                let view = views.borrow_and_update().clone();
                screen.show(&view, words);
                let newly_failed = screen.newly_failed(&view);

                match &view.playback {
                    PlaybackState::Finished { .. } => {
                        println!("\n\nGoodnight.");
                        return Ok(ListenOutcome::Finished);
                    }
                    PlaybackState::Failed { reason } if newly_failed => {
                        if !input_open {
                            return Err(CliError::Playback(reason.to_string()).into());
                        }
                        println!("\nType `restart` to try again or `q` to quit.");
                    }
                    _ => {}
                }
            }
            line = input.recv(), if input_open => {
                let Some(line) = line else {
                    input_open = false;
                    if matches!(views.borrow().playback, PlaybackState::Failed { .. }) {
                        return Err(CliError::Playback("narration failed".to_string()).into());
                    }
                    continue;
                };
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(ListenCommand::Quit)) => return Ok(ListenOutcome::Quit),
                    Ok(Some(ListenCommand::Help)) => println!("\n{HELP}"),
                    Ok(Some(command)) => apply(controller, settings, &views, command).await?,
                    Err(message) => println!("\n{message}"),
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(ListenOutcome::Quit),
        }
    }
}

async fn apply(
    controller: &PlaybackController,
    settings: &SettingsStore,
    views: &watch::Receiver<PlaybackView>,
    command: ListenCommand,
) -> Result<()> {
    let result = match command {
        ListenCommand::Pause => controller.pause().await,
        ListenCommand::Resume => controller.resume().await,
        ListenCommand::Restart => controller.restart().await,
        ListenCommand::Seek(target) => {
            let current = views.borrow().display_position_ms().unwrap_or(0);
            controller.seek(target.resolve(current)).await
        }
        ListenCommand::ToggleAmbience => {
            let enabled = !settings.current().ambience_enabled;
            report_settings(settings.update(&SettingsUpdate::default().ambience_enabled(enabled)));
            Ok(())
        }
        ListenCommand::Volume(volume) => {
            report_settings(settings.update(&SettingsUpdate::default().ambience_volume(volume)));
            Ok(())
        }
        ListenCommand::Help | ListenCommand::Quit => Ok(()),
    };

    match result {
        Err(PlaybackError::ControllerClosed) => {
            Err(CliError::from(PlaybackError::ControllerClosed).into())
        }
        Err(e) => {
            println!("\n{e}");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

fn report_settings<T>(result: Result<T, lullaby_core::SettingsError>) {
    if let Err(e) = result {
        println!("\n{e}");
    }
}

/// The single status line at the bottom of the terminal.
#[derive(Default)]
struct Screen {
    last_line: String,
    failed: bool,
}

impl Screen {
    fn show(&mut self, view: &PlaybackView, words: &[&str]) {
        let line = render_progress(view, words);
        if line == self.last_line {
            return;
        }
        print!("\r\x1b[2K{line}");
        let _ = io::stdout().flush();
        self.last_line = line;
    }

    /// True on the first snapshot of a failure.
    fn newly_failed(&mut self, view: &PlaybackView) -> bool {
        let failed = matches!(view.playback, PlaybackState::Failed { .. });
        let newly = failed && !self.failed;
        self.failed = failed;
        newly
    }
}
