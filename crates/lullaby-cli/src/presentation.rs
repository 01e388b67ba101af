//! Terminal formatting for stories and narration progress.
//!
//! Format-only: every function here is pure and returns a `String`.

use lullaby_core::{AmbienceState, PlaybackState};
use lullaby_playback::PlaybackView;

const BAR_WIDTH: usize = 24;

/// Format milliseconds as `m:ss`, or `h:mm:ss` from one hour on.
///
/// ```rust
/// use lullaby_cli::presentation::format_clock;
///
/// assert_eq!(format_clock(61_500), "1:01");
/// assert_eq!(format_clock(3_723_000), "1:02:03");
/// ```
pub fn format_clock(ms: u64) -> String {
    let total = ms / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// A fixed-width bar such as `[######------]`.
pub fn progress_bar(position_ms: u64, duration_ms: u64, width: usize) -> String {
    let filled = if duration_ms == 0 {
        0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let ratio = position_ms.min(duration_ms) as f64 / duration_ms as f64;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let filled = (ratio * width as f64).round() as usize;
        filled.min(width)
    };
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// One-line status for the listen loop.
pub fn render_progress(view: &PlaybackView, words: &[&str]) -> String {
    let line = match &view.playback {
        PlaybackState::Idle => "Ready".to_string(),
        PlaybackState::Fetching => "Preparing narration...".to_string(),
        PlaybackState::Loaded { .. } => "Starting...".to_string(),
        PlaybackState::Playing { duration_ms, .. } | PlaybackState::Paused { duration_ms, .. } => {
            let position = view.display_position_ms().unwrap_or(0);
            let marker = if view.scrub_position_ms.is_some() {
                ">>"
            } else if view.playback.is_playing() {
                "|>"
            } else {
                "||"
            };
            let word = words.get(view.highlight).copied().unwrap_or("");
            format!(
                "{marker} {} / {} {}  {word}",
                format_clock(position),
                duration_label(*duration_ms),
                progress_bar(position, *duration_ms, BAR_WIDTH),
            )
        }
        PlaybackState::Finished { duration_ms } => {
            format!("The end ({})", format_clock(*duration_ms))
        }
        PlaybackState::Failed { reason } => format!("Narration stopped: {reason}"),
    };

    match view.ambience {
        AmbienceState::Looping { volume } => format!("{line}  ~ rain {}%", percent(volume)),
        AmbienceState::Stopped => line,
    }
}

/// Wrap `text` at `width` columns, keeping blank-line paragraph breaks.
pub fn wrap_text(text: &str, width: usize) -> String {
    let mut out = Vec::new();
    for paragraph in text.split("\n\n") {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.len() + 1 + word.len() > width {
                out.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        if !line.is_empty() {
            out.push(line);
        }
        out.push(String::new());
    }
    out.pop();
    out.join("\n")
}

fn duration_label(duration_ms: u64) -> String {
    if duration_ms == 0 {
        "--:--".to_string()
    } else {
        format_clock(duration_ms)
    }
}

fn percent(volume: f32) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = (volume.clamp(0.0, 1.0) * 100.0).round() as u32;
    value
}
