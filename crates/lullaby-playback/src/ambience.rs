//! Ambience loop: a background track driven only by settings.
//!
//! [`AmbienceChannel`] wraps an [`AmbienceOutput`] and tracks
//! [`AmbienceState`]. [`AmbienceDriver`] runs the channel on its own task so
//! that ambience changes never wait on narration transport, and narration
//! never waits on ambience.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lullaby_core::{AmbienceState, NarrationSettings};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio_io::AmbienceOutput;
use crate::error::{EngineError, PlaybackError};

/// The ambience channel.
pub struct AmbienceChannel {
    output: Arc<dyn AmbienceOutput>,
    asset: Option<PathBuf>,
    volume: f32,
    state_tx: watch::Sender<AmbienceState>,
}

impl AmbienceChannel {
    /// A stopped channel looping `asset` once enabled.
    pub fn new(output: Arc<dyn AmbienceOutput>, asset: Option<PathBuf>, volume: f32) -> Self {
        let (state_tx, _rx) = watch::channel(AmbienceState::Stopped);
        Self {
            output,
            asset,
            volume: volume.clamp(0.0, 1.0),
            state_tx,
        }
    }

    #[must_use]
    pub fn state(&self) -> AmbienceState {
        *self.state_tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AmbienceState> {
        self.state_tx.subscribe()
    }

    /// Start or stop the loop.
    ///
    /// A failed start leaves the channel `Stopped` and returns
    /// [`PlaybackError::AmbienceLoadFailed`]; callers treat it as non-fatal.
    pub async fn set_enabled(&mut self, enabled: bool) -> Result<(), PlaybackError> {
        match (enabled, self.state()) {
            (true, AmbienceState::Stopped) => self.start().await,
            (false, AmbienceState::Looping { .. }) => {
                self.stop().await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The volume used for the next start, or the live volume while looping.
    #[must_use]
    pub const fn volume(&self) -> f32 {
        self.volume
    }

    /// Change the volume, live if the loop is running.
    ///
    /// A rejected live change keeps the previous volume and returns
    /// [`PlaybackError::AmbienceVolumeFailed`].
    pub async fn set_volume(&mut self, volume: f32) -> Result<(), PlaybackError> {
        let volume = volume.clamp(0.0, 1.0);

        match self.state() {
            AmbienceState::Looping { volume: current }
                if (current - volume).abs() > f32::EPSILON =>
            {
                self.output
                    .set_volume(volume)
                    .await
                    .map_err(PlaybackError::AmbienceVolumeFailed)?;
                self.volume = volume;
                debug!(volume, "Ambience volume changed");
                self.publish(AmbienceState::Looping { volume });
            }
            _ => self.volume = volume,
        }
        Ok(())
    }

    /// Apply enabled flag and volume from `settings`.
    pub async fn apply(&mut self, settings: &NarrationSettings) -> Result<(), PlaybackError> {
        let volume = self.set_volume(settings.ambience_volume).await;
        let enabled = self.set_enabled(settings.ambience_enabled).await;
        volume.and(enabled)
    }

    /// Stop the loop regardless of the enabled flag.
    pub async fn release(&mut self) {
        if self.state().is_looping() {
            self.stop().await;
        }
    }

    async fn start(&mut self) -> Result<(), PlaybackError> {
        let Some(asset) = self.asset.clone() else {
            return Err(PlaybackError::AmbienceLoadFailed(EngineError::Load(
                "no ambience asset configured".to_string(),
            )));
        };

        self.output
            .start_loop(&asset, self.volume)
            .await
            .map_err(PlaybackError::AmbienceLoadFailed)?;

        info!(asset = %asset.display(), volume = self.volume, "Ambience started");
        self.publish(AmbienceState::Looping {
            volume: self.volume,
        });
        Ok(())
    }

    async fn stop(&mut self) {
        if let Err(e) = self.output.stop_loop().await {
            warn!(error = %e, "Failed to stop ambience loop");
        }
        info!("Ambience stopped");
        self.publish(AmbienceState::Stopped);
    }

    fn publish(&self, state: AmbienceState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

// ── Driver task ────────────────────────────────────────────────────

enum AmbienceCommand {
    /// A story was opened: apply the current settings and follow changes.
    Open,
    /// The story was closed: stop the loop and ignore settings until reopened.
    Release,
    Shutdown { done: oneshot::Sender<()> },
}

/// Runs an [`AmbienceChannel`] on its own task, following settings changes
/// while a story is open.
///
/// Dropping the driver closes its command channel; the task then stops the
/// loop and exits.
pub struct AmbienceDriver {
    cmd_tx: mpsc::UnboundedSender<AmbienceCommand>,
    state_rx: watch::Receiver<AmbienceState>,
    task: Option<JoinHandle<()>>,
}

impl AmbienceDriver {
    /// Spawn the driver. The channel starts released (no story open).
    pub fn spawn(mut channel: AmbienceChannel, settings: watch::Receiver<NarrationSettings>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state_rx = channel.subscribe();

        let task = tokio::spawn(async move {
            Self::run(&mut channel, cmd_rx, settings).await;
        });

        Self {
            cmd_tx,
            state_rx,
            task: Some(task),
        }
    }

    #[must_use]
    pub fn state(&self) -> AmbienceState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AmbienceState> {
        self.state_rx.clone()
    }

    /// Begin following settings. Does not wait for the loop to start.
    pub fn open(&self) {
        let _ = self.cmd_tx.send(AmbienceCommand::Open);
    }

    /// Stop following settings and stop the loop. Does not wait for the
    /// loop to stop; a later [`Self::open`] is applied after it.
    pub fn release(&self) {
        let _ = self.cmd_tx.send(AmbienceCommand::Release);
    }

    /// Stop the loop and end the task, waiting at most `grace`.
    ///
    /// A driver still stuck on the device after `grace` is aborted.
    pub async fn shutdown(&mut self, grace: Duration) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        let (done, rx) = oneshot::channel();
        if self.cmd_tx.send(AmbienceCommand::Shutdown { done }).is_err() {
            let _ = task.await;
            return;
        }

        let finished = tokio::time::timeout(grace, async {
            let _ = rx.await;
            let _ = (&mut task).await;
        })
        .await;
        if finished.is_err() {
            warn!(?grace, "Ambience driver did not stop in time; aborting it");
            task.abort();
        }
    }

    async fn run(
        channel: &mut AmbienceChannel,
        mut cmd_rx: mpsc::UnboundedReceiver<AmbienceCommand>,
        mut settings: watch::Receiver<NarrationSettings>,
    ) {
        let mut open = false;
        let mut settings_alive = true;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(AmbienceCommand::Open) => {
                        open = true;
                        let current = settings.borrow_and_update().clone();
                        absorb(channel.apply(&current).await);
                    }
                    Some(AmbienceCommand::Release) => {
                        open = false;
                        channel.release().await;
                    }
                    Some(AmbienceCommand::Shutdown { done }) => {
                        channel.release().await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        channel.release().await;
                        break;
                    }
                },
                changed = settings.changed(), if open && settings_alive => {
                    if changed.is_err() {
                        settings_alive = false;
                        continue;
                    }
                    let current = settings.borrow_and_update().clone();
                    absorb(channel.apply(&current).await);
                }
            }
        }

        debug!("Ambience driver stopped");
    }
}

/// Ambience failures never propagate past the driver.
fn absorb(result: Result<(), PlaybackError>) {
    if let Err(e) = result {
        warn!(error = %e, "Ambience unavailable; narration continues without it");
    }
}
