//! Narration transport state machine.
//!
//! ```text
//!   Idle ─begin_fetch─▶ Fetching ─complete_fetch(ok)─▶ Loaded ─▶ Playing ⇄ Paused
//!                          │                                       │
//!                          └─complete_fetch(err)─▶ Failed          └─did_just_finish─▶ Finished
//! ```
//!
//! `Finished` and `Failed` are left again through `begin_fetch`. Every fetch
//! bumps the [`Generation`]; completions and polls carrying an older
//! generation are rejected with [`PlaybackError::StaleCompletion`].
//!
//! Transport calls that arrive while `Fetching` are queued and replayed in
//! order right after the track starts playing.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use lullaby_core::{CachedAudioHandle, FailureReason, FetchError, PlaybackState, ProgressSample};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::audio_io::{EngineStatus, NarrationOutput};
use crate::error::{EngineError, PlaybackError};

/// Identity of one fetch/load cycle.
///
/// Used to prevent stale completions when a fetch is superseded by a newer
/// `start`/`restart` or by teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Events emitted by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// The playback state changed.
    StateChanged { state: PlaybackState },
    /// A scrub started, moved (`Some`) or ended (`None`).
    ScrubChanged { position_ms: Option<u64> },
    /// The narration resource was released.
    Released,
}

/// Result of one progress poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not playing, or a scrub is in progress; nothing applied.
    Skipped,
    /// Position/duration applied.
    Progress(ProgressSample),
    /// The track reached its end.
    Finished,
}

/// Transport call deferred until the track is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Pause,
    Resume,
    Seek(u64),
}

/// One narration channel and its state machine.
pub struct PlaybackSession {
    output: Arc<dyn NarrationOutput>,
    state: PlaybackState,
    generation: Generation,
    /// Whether the output currently holds a track that must be unloaded.
    engine_loaded: bool,
    pending: VecDeque<Deferred>,
    /// `Some(position)` while a scrub is in progress.
    scrub: Option<u64>,
    event_tx: mpsc::UnboundedSender<PlaybackEvent>,
}

impl PlaybackSession {
    /// Create an idle session.
    ///
    /// Returns the session and a receiver for [`PlaybackEvent`]s.
    pub fn new(
        output: Arc<dyn NarrationOutput>,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = Self {
            output,
            state: PlaybackState::Idle,
            generation: Generation(0),
            engine_loaded: false,
            pending: VecDeque::new(),
            scrub: None,
            event_tx,
        };
        (session, event_rx)
    }

    #[must_use]
    pub const fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub const fn is_scrubbing(&self) -> bool {
        self.scrub.is_some()
    }

    #[must_use]
    pub const fn scrub_position(&self) -> Option<u64> {
        self.scrub
    }

    /// Number of transport calls waiting for the track to load.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    // ── Fetch / load ───────────────────────────────────────────────

    /// Enter `Fetching` for a new attempt.
    ///
    /// Unloads any current track and invalidates every outstanding
    /// completion. Returns the generation the caller must tag the fetch with.
    pub async fn begin_fetch(&mut self) -> Generation {
        self.unload_engine().await;
        self.pending.clear();
        self.end_scrub_silently();
        self.generation = self.generation.next();
        self.set_state(PlaybackState::Fetching);
        debug!(generation = %self.generation, "Narration fetch started");
        self.generation
    }

    /// Apply the result of the fetch started at `generation`.
    ///
    /// On success the track is loaded, auto-played, and any deferred
    /// transport calls are replayed in order.
    pub async fn complete_fetch(
        &mut self,
        generation: Generation,
        result: Result<CachedAudioHandle, FetchError>,
    ) -> Result<(), PlaybackError> {
        if generation != self.generation || self.state != PlaybackState::Fetching {
            trace!(
                generation = %generation,
                current = %self.generation,
                "Discarding stale fetch completion"
            );
            return Err(PlaybackError::StaleCompletion);
        }

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail(PlaybackError::FetchFailed(e))),
        };

        let duration_ms = match self.output.load(&handle).await {
            Ok(duration_ms) => duration_ms,
            Err(e) => return Err(self.fail(PlaybackError::EngineLoadFailed(e))),
        };
        self.engine_loaded = true;
        info!(key = %handle.key(), duration_ms, "Narration track loaded");
        self.set_state(PlaybackState::Loaded { handle });

        if let Err(e) = self.output.play().await {
            return Err(self.fail_engine(e).await);
        }
        self.set_state(PlaybackState::Playing {
            position_ms: 0,
            duration_ms,
        });

        while let Some(deferred) = self.pending.pop_front() {
            debug!(?deferred, "Replaying deferred transport call");
            match deferred {
                Deferred::Pause => self.pause().await?,
                Deferred::Resume => self.resume().await?,
                Deferred::Seek(position_ms) => self.seek(position_ms).await?,
            }
        }
        Ok(())
    }

    // ── Transport ──────────────────────────────────────────────────

    /// Pause playback. A no-op when already paused.
    pub async fn pause(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            PlaybackState::Playing {
                position_ms,
                duration_ms,
            } => {
                if let Err(e) = self.output.pause().await {
                    return Err(self.fail_engine(e).await);
                }
                // Freeze at the engine's actual position when it can tell us.
                let status = self.output.status().await.ok();
                let (position_ms, duration_ms) = status
                    .as_ref()
                    .map_or((position_ms, duration_ms), |s| merge_status(duration_ms, s));
                if status.is_some_and(|s| s.did_just_finish) {
                    self.set_state(PlaybackState::Finished { duration_ms });
                    return Ok(());
                }
                self.set_state(PlaybackState::Paused {
                    position_ms,
                    duration_ms,
                });
                Ok(())
            }
            PlaybackState::Paused { .. } => Ok(()),
            PlaybackState::Fetching => {
                self.pending.push_back(Deferred::Pause);
                Ok(())
            }
            _ => Err(PlaybackError::NotLoaded),
        }
    }

    /// Resume playback. A no-op when already playing.
    pub async fn resume(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            PlaybackState::Paused {
                position_ms,
                duration_ms,
            } => {
                if let Err(e) = self.output.play().await {
                    return Err(self.fail_engine(e).await);
                }
                self.set_state(PlaybackState::Playing {
                    position_ms,
                    duration_ms,
                });
                Ok(())
            }
            PlaybackState::Playing { .. } => Ok(()),
            PlaybackState::Fetching => {
                self.pending.push_back(Deferred::Resume);
                Ok(())
            }
            _ => Err(PlaybackError::NotLoaded),
        }
    }

    /// Seek to an absolute position, clamped into `[0, duration]` once the
    /// duration is known. The playing/paused state is kept.
    pub async fn seek(&mut self, position_ms: u64) -> Result<(), PlaybackError> {
        let (playing, duration_ms) = match self.state {
            PlaybackState::Playing { duration_ms, .. } => (true, duration_ms),
            PlaybackState::Paused { duration_ms, .. } => (false, duration_ms),
            PlaybackState::Fetching => {
                self.pending.push_back(Deferred::Seek(position_ms));
                return Ok(());
            }
            _ => return Err(PlaybackError::NotLoaded),
        };

        let position_ms = clamp_position(position_ms, duration_ms);
        if let Err(e) = self.output.seek(position_ms).await {
            return Err(self.fail_engine(e).await);
        }
        debug!(position_ms, "Narration seek");

        self.set_state(if playing {
            PlaybackState::Playing {
                position_ms,
                duration_ms,
            }
        } else {
            PlaybackState::Paused {
                position_ms,
                duration_ms,
            }
        });
        Ok(())
    }

    // ── Scrub ──────────────────────────────────────────────────────

    /// Start a scrub. Progress samples are ignored until [`Self::end_scrub`].
    pub fn begin_scrub(&mut self) -> Result<(), PlaybackError> {
        let Some((position_ms, _)) = self.loaded_progress() else {
            return Err(PlaybackError::NotLoaded);
        };
        if self.scrub.is_none() {
            self.set_scrub(Some(position_ms));
        }
        Ok(())
    }

    /// Move the scrub position. Display only; the engine is not touched.
    pub fn scrub_to(&mut self, position_ms: u64) -> Result<(), PlaybackError> {
        let Some((_, duration_ms)) = self.loaded_progress() else {
            return Err(PlaybackError::NotLoaded);
        };
        self.set_scrub(Some(clamp_position(position_ms, duration_ms)));
        Ok(())
    }

    /// Finish the scrub with exactly one seek to `position_ms`.
    pub async fn end_scrub(&mut self, position_ms: u64) -> Result<(), PlaybackError> {
        if self.scrub.is_some() {
            self.set_scrub(None);
        }
        self.seek(position_ms).await
    }

    // ── Progress ───────────────────────────────────────────────────

    /// Query the engine and apply its status.
    pub async fn poll(&mut self, generation: Generation) -> Result<PollOutcome, PlaybackError> {
        if generation != self.generation {
            trace!(generation = %generation, "Discarding stale progress poll");
            return Err(PlaybackError::StaleCompletion);
        }
        if !self.state.is_playing() || self.scrub.is_some() {
            return Ok(PollOutcome::Skipped);
        }

        match self.output.status().await {
            Ok(status) => self.apply_status(generation, &status),
            Err(e) => Err(self.fail_engine(e).await),
        }
    }

    /// Apply an engine status report produced for `generation`.
    ///
    /// Applied only while `Playing` and not scrubbing.
    pub fn apply_status(
        &mut self,
        generation: Generation,
        status: &EngineStatus,
    ) -> Result<PollOutcome, PlaybackError> {
        if generation != self.generation {
            trace!(generation = %generation, "Discarding stale progress sample");
            return Err(PlaybackError::StaleCompletion);
        }
        let PlaybackState::Playing { duration_ms, .. } = self.state else {
            return Ok(PollOutcome::Skipped);
        };
        if self.scrub.is_some() {
            return Ok(PollOutcome::Skipped);
        }

        let (position_ms, duration_ms) = merge_status(duration_ms, status);
        if status.did_just_finish {
            info!(duration_ms, "Narration finished");
            self.set_state(PlaybackState::Finished { duration_ms });
            return Ok(PollOutcome::Finished);
        }

        self.set_state(PlaybackState::Playing {
            position_ms,
            duration_ms,
        });
        Ok(PollOutcome::Progress(ProgressSample::new(
            position_ms,
            duration_ms,
        )))
    }

    // ── Teardown ───────────────────────────────────────────────────

    /// Release the narration resource and return to `Idle`.
    ///
    /// Safe in every state; the track is unloaded at most once. Outstanding
    /// fetches and polls become stale.
    pub async fn release(&mut self) {
        self.unload_engine().await;
        self.pending.clear();
        self.end_scrub_silently();
        self.generation = self.generation.next();
        self.set_state(PlaybackState::Idle);
        self.emit(PlaybackEvent::Released);
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn loaded_progress(&self) -> Option<(u64, u64)> {
        match self.state {
            PlaybackState::Playing { .. } | PlaybackState::Paused { .. } => self.state.progress(),
            _ => None,
        }
    }

    async fn unload_engine(&mut self) {
        if !self.engine_loaded {
            return;
        }
        self.engine_loaded = false;
        if let Err(e) = self.output.unload().await {
            warn!(error = %e, "Failed to unload narration track");
        }
    }

    /// Transport failure on a loaded track: release it and land in `Failed`.
    async fn fail_engine(&mut self, e: EngineError) -> PlaybackError {
        self.unload_engine().await;
        self.fail(PlaybackError::EngineFailed(e))
    }

    fn fail(&mut self, error: PlaybackError) -> PlaybackError {
        self.pending.clear();
        self.end_scrub_silently();
        let reason = error
            .failure_reason()
            .unwrap_or_else(|| FailureReason::EngineFailed {
                message: error.to_string(),
            });
        warn!(error = %error, "Narration failed");
        self.set_state(PlaybackState::Failed { reason });
        error
    }

    fn end_scrub_silently(&mut self) {
        if self.scrub.is_some() {
            self.set_scrub(None);
        }
    }

    fn set_scrub(&mut self, position_ms: Option<u64>) {
        if self.scrub != position_ms {
            self.scrub = position_ms;
            self.emit(PlaybackEvent::ScrubChanged { position_ms });
        }
    }

    /// Transition to a new state and emit a state-change event.
    fn set_state(&mut self, new_state: PlaybackState) {
        if self.state != new_state {
            debug!(old = %self.state, new = %new_state, "Playback state transition");
            self.state = new_state.clone();
            self.emit(PlaybackEvent::StateChanged { state: new_state });
        }
    }

    /// Emit an event (best-effort: a dropped receiver is logged and ignored).
    fn emit(&self, event: PlaybackEvent) {
        if self.event_tx.send(event).is_err() {
            trace!("Playback event receiver dropped");
        }
    }
}

const fn clamp_position(position_ms: u64, duration_ms: u64) -> u64 {
    if duration_ms > 0 && position_ms > duration_ms {
        duration_ms
    } else {
        position_ms
    }
}

/// Combine the last known progress with an engine report. An unknown (0)
/// duration in the report keeps the known one.
fn merge_status(duration_ms: u64, status: &EngineStatus) -> (u64, u64) {
    let duration_ms = if status.duration_ms > 0 {
        status.duration_ms
    } else {
        duration_ms
    };
    let position_ms = if status.did_just_finish && duration_ms > 0 {
        duration_ms
    } else {
        clamp_position(status.position_ms, duration_ms)
    };
    (position_ms, duration_ms)
}
