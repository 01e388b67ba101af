//! Playback controller: the composition root of the engine.
//!
//! The controller is an actor. One task owns the [`PlaybackSession`], the
//! open [`StorySession`] and the poller; every public method sends a command
//! and awaits the reply, so transport calls reach the device strictly one at
//! a time and in submission order. Fetches run on their own tasks and report
//! back as commands tagged with the session [`Generation`] that started them.
//! The poller runs only while narration is `Playing`. Ambience is driven by
//! its own task and is never awaited by a narration transition.
//!
//! The presentation layer reads a single [`PlaybackView`] snapshot (watch
//! channel) recomputed after every event, and can follow individual
//! [`PlaybackEvent`]s on a broadcast channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lullaby_core::{
    AmbienceState, CacheKey, CachedAudioHandle, FetchError, PlaybackState, SessionId,
    SettingsStore, StorySession, SynthesisRequest,
};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::ambience::{AmbienceChannel, AmbienceDriver};
use crate::audio_io::{AmbienceOutput, NarrationOutput};
use crate::cache::AudioCache;
use crate::error::PlaybackError;
use crate::projector::highlight_cursor;
use crate::session::{Generation, PlaybackEvent, PlaybackSession, PollOutcome};

/// Default progress polling cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default bound on waiting for the ambience loop to stop at shutdown.
pub const DEFAULT_AMBIENCE_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const EVENT_CAPACITY: usize = 256;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How often the engine is asked for position/duration while playing.
    pub poll_interval: Duration,
    /// How long shutdown waits for the ambience device before giving up.
    pub ambience_shutdown_grace: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            ambience_shutdown_grace: DEFAULT_AMBIENCE_SHUTDOWN_GRACE,
        }
    }
}

/// Collaborators injected into the controller.
pub struct ControllerDeps {
    pub cache: AudioCache,
    pub narration: Arc<dyn NarrationOutput>,
    pub ambience: Arc<dyn AmbienceOutput>,
    /// Bundled ambience track. `None` keeps ambience stopped.
    pub ambience_asset: Option<PathBuf>,
}

/// Snapshot consumed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackView {
    /// Open story session, if any.
    pub session: Option<SessionId>,
    pub playback: PlaybackState,
    pub ambience: AmbienceState,
    /// Index of the word considered spoken.
    pub highlight: usize,
    pub word_count: usize,
    /// User-driven position while a scrub is in progress.
    pub scrub_position_ms: Option<u64>,
}

impl PlaybackView {
    fn empty(ambience: AmbienceState) -> Self {
        Self {
            session: None,
            playback: PlaybackState::Idle,
            ambience,
            highlight: 0,
            word_count: 0,
            scrub_position_ms: None,
        }
    }

    /// Position to display: the scrub position while scrubbing, else the
    /// playback position.
    #[must_use]
    pub fn display_position_ms(&self) -> Option<u64> {
        self.scrub_position_ms
            .or_else(|| self.playback.progress().map(|(position, _)| position))
    }
}

// ── Commands ───────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<Result<T, PlaybackError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Start,
    Pause,
    Resume,
    Restart,
    Seek(u64),
    BeginScrub,
    ScrubTo(u64),
    EndScrub(u64),
}

enum Command {
    OpenStory {
        text: Arc<str>,
        reply: Reply<SessionId>,
    },
    CloseStory {
        reply: Reply<()>,
    },
    Transport {
        transport: Transport,
        reply: Reply<()>,
    },
    FetchFinished {
        generation: Generation,
        key: CacheKey,
        result: Result<CachedAudioHandle, FetchError>,
    },
    Poll {
        generation: Generation,
    },
    Shutdown {
        done: Option<oneshot::Sender<()>>,
    },
}

// ── Handle ─────────────────────────────────────────────────────────

/// Handle to the playback controller task.
///
/// Dropping the handle tears the controller down (narration unloaded,
/// ambience stopped); call [`Self::shutdown`] to wait for that to finish.
pub struct PlaybackController {
    cmd_tx: mpsc::UnboundedSender<Command>,
    view_rx: watch::Receiver<PlaybackView>,
    events_tx: broadcast::Sender<PlaybackEvent>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackController {
    /// Spawn the controller task. Must be called within a tokio runtime.
    pub fn spawn(deps: ControllerDeps, settings: SettingsStore, config: ControllerConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let initial = settings.current();
        let channel = AmbienceChannel::new(
            deps.ambience,
            deps.ambience_asset,
            initial.ambience_volume,
        );
        let ambience = AmbienceDriver::spawn(channel, settings.subscribe());
        let ambience_rx = ambience.subscribe();

        let (view_tx, view_rx) = watch::channel(PlaybackView::empty(ambience.state()));
        let (session, session_events) = PlaybackSession::new(deps.narration);

        let actor = ControllerActor {
            session,
            session_events,
            story: None,
            last_id: SessionId::new(0),
            cache: deps.cache,
            ambience,
            ambience_rx,
            settings,
            config,
            cmd_tx: cmd_tx.downgrade(),
            poller: None,
            view_tx,
            events_tx: events_tx.clone(),
        };
        let task = tokio::spawn(actor.run(cmd_rx));

        Self {
            cmd_tx,
            view_rx,
            events_tx,
            task: Some(task),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn view(&self) -> PlaybackView {
        self.view_rx.borrow().clone()
    }

    /// Receiver notified whenever the snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlaybackView> {
        self.view_rx.clone()
    }

    /// Stream of individual playback events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events_tx.subscribe()
    }

    /// Open a story, replacing (and releasing) any open one.
    pub async fn open_story(&self, text: impl Into<Arc<str>>) -> Result<SessionId, PlaybackError> {
        let text = text.into();
        self.request(|reply| Command::OpenStory { text, reply }).await
    }

    /// Close the open story, releasing narration and ambience.
    pub async fn close_story(&self) -> Result<(), PlaybackError> {
        self.request(|reply| Command::CloseStory { reply }).await
    }

    /// "Listen": fetch and play, or resume when paused.
    pub async fn start(&self) -> Result<(), PlaybackError> {
        self.transport(Transport::Start).await
    }

    pub async fn pause(&self) -> Result<(), PlaybackError> {
        self.transport(Transport::Pause).await
    }

    pub async fn resume(&self) -> Result<(), PlaybackError> {
        self.transport(Transport::Resume).await
    }

    /// Reload the track and play from the beginning.
    pub async fn restart(&self) -> Result<(), PlaybackError> {
        self.transport(Transport::Restart).await
    }

    pub async fn seek(&self, position_ms: u64) -> Result<(), PlaybackError> {
        self.transport(Transport::Seek(position_ms)).await
    }

    pub async fn begin_scrub(&self) -> Result<(), PlaybackError> {
        self.transport(Transport::BeginScrub).await
    }

    pub async fn scrub_to(&self, position_ms: u64) -> Result<(), PlaybackError> {
        self.transport(Transport::ScrubTo(position_ms)).await
    }

    pub async fn end_scrub(&self, position_ms: u64) -> Result<(), PlaybackError> {
        self.transport(Transport::EndScrub(position_ms)).await
    }

    /// Tear down and wait until every audio resource is released.
    pub async fn shutdown(mut self) {
        let (done, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Shutdown { done: Some(done) }).is_ok() {
            let _ = rx.await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    async fn transport(&self, transport: Transport) -> Result<(), PlaybackError> {
        self.request(|reply| Command::Transport { transport, reply })
            .await
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, PlaybackError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| PlaybackError::ControllerClosed)?;
        rx.await.map_err(|_| PlaybackError::ControllerClosed)?
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.cmd_tx.send(Command::Shutdown { done: None });
        }
    }
}

// ── Actor ──────────────────────────────────────────────────────────

struct ControllerActor {
    session: PlaybackSession,
    session_events: mpsc::UnboundedReceiver<PlaybackEvent>,
    story: Option<StorySession>,
    last_id: SessionId,
    cache: AudioCache,
    ambience: AmbienceDriver,
    ambience_rx: watch::Receiver<AmbienceState>,
    settings: SettingsStore,
    config: ControllerConfig,
    /// Weak so that fetch tasks and the poller never keep the actor alive.
    cmd_tx: mpsc::WeakUnboundedSender<Command>,
    poller: Option<Poller>,
    view_tx: watch::Sender<PlaybackView>,
    events_tx: broadcast::Sender<PlaybackEvent>,
}

/// Task sending [`Command::Poll`] on every tick.
struct Poller {
    generation: Generation,
    task: JoinHandle<()>,
}

impl ControllerActor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let mut ambience_alive = true;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if let Command::Shutdown { done } = cmd {
                        self.teardown().await;
                        if let Some(done) = done {
                            let _ = done.send(());
                        }
                        return;
                    }
                    self.handle(cmd).await;
                    self.sync_poller();
                }
                changed = self.ambience_rx.changed(), if ambience_alive => {
                    if changed.is_err() {
                        ambience_alive = false;
                    }
                }
            }
            self.publish();
        }

        self.teardown().await;
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::OpenStory { text, reply } => {
                let id = self.open_story(text).await;
                let _ = reply.send(Ok(id));
            }
            Command::CloseStory { reply } => {
                self.close_story().await;
                let _ = reply.send(Ok(()));
            }
            Command::Transport { transport, reply } => {
                let result = self.transport(transport).await;
                let _ = reply.send(result);
            }
            Command::FetchFinished {
                generation,
                key,
                result,
            } => self.fetch_finished(generation, &key, result).await,
            Command::Poll { generation } => self.poll(generation).await,
            Command::Shutdown { .. } => {}
        }
    }

    // ── Story lifecycle ────────────────────────────────────────────

    async fn open_story(&mut self, text: Arc<str>) -> SessionId {
        self.close_story().await;

        let voice = self.settings.current().voice;
        let id = self.next_id();
        let story = StorySession::new(id, text, voice);
        info!(session = %id, key = %story.key(), words = story.word_count(), "Story opened");
        self.story = Some(story);
        self.ambience.open();
        id
    }

    async fn close_story(&mut self) {
        self.stop_poller();
        self.session.release().await;
        if let Some(story) = self.story.take() {
            info!(session = %story.id(), "Story closed");
        }
        self.ambience.release();
    }

    async fn teardown(&mut self) {
        self.close_story().await;
        self.ambience.shutdown(self.config.ambience_shutdown_grace).await;
        self.publish();
        debug!("Playback controller stopped");
    }

    fn next_id(&mut self) -> SessionId {
        self.last_id = self.last_id.next();
        self.last_id
    }

    // ── Transport routing ──────────────────────────────────────────

    async fn transport(&mut self, transport: Transport) -> Result<(), PlaybackError> {
        if self.story.is_none() {
            return Err(PlaybackError::NoStory);
        }
        debug!(?transport, state = %self.session.state(), "Transport request");

        match transport {
            Transport::Start => self.start().await,
            Transport::Resume => match self.session.state() {
                PlaybackState::Idle | PlaybackState::Failed { .. } => self.start().await,
                PlaybackState::Finished { .. } => self.restart().await,
                _ => self.session.resume().await,
            },
            Transport::Restart => self.restart().await,
            Transport::Pause => self.session.pause().await,
            Transport::Seek(position_ms) => self.session.seek(position_ms).await,
            Transport::BeginScrub => self.session.begin_scrub(),
            Transport::ScrubTo(position_ms) => self.session.scrub_to(position_ms),
            Transport::EndScrub(position_ms) => self.session.end_scrub(position_ms).await,
        }
    }

    async fn start(&mut self) -> Result<(), PlaybackError> {
        self.rekey_if_voice_changed().await;
        match self.session.state() {
            PlaybackState::Idle | PlaybackState::Failed { .. } | PlaybackState::Finished { .. } => {
                self.begin_fetch().await
            }
            PlaybackState::Paused { .. } => self.session.resume().await,
            PlaybackState::Fetching | PlaybackState::Loaded { .. } | PlaybackState::Playing { .. } => {
                Ok(())
            }
        }
    }

    async fn restart(&mut self) -> Result<(), PlaybackError> {
        self.rekey_if_voice_changed().await;
        self.begin_fetch().await
    }

    /// Replace the open story session when the configured voice changed.
    async fn rekey_if_voice_changed(&mut self) {
        let voice = self.settings.current().voice;
        if !self.story.as_ref().is_some_and(|story| story.voice() != voice) {
            return;
        }

        let id = self.next_id();
        let Some(previous) = self.story.take() else {
            return;
        };
        let next = previous.with_voice(id, voice);
        info!(
            old = %previous.id(),
            new = %id,
            voice = %next.voice(),
            "Voice changed; starting a new story session"
        );
        self.stop_poller();
        self.session.release().await;
        self.story = Some(next);
    }

    async fn begin_fetch(&mut self) -> Result<(), PlaybackError> {
        let Some(story) = self.story.as_ref() else {
            return Err(PlaybackError::NoStory);
        };
        let key = story.key().clone();
        let request = SynthesisRequest::new(story.text(), story.voice());

        self.stop_poller();
        let generation = self.session.begin_fetch().await;

        let cache = self.cache.clone();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = cache.fetch_or_get(&key, request).await;
            if let Some(tx) = cmd_tx.upgrade() {
                let _ = tx.send(Command::FetchFinished {
                    generation,
                    key,
                    result,
                });
            }
        });
        Ok(())
    }

    async fn fetch_finished(
        &mut self,
        generation: Generation,
        key: &CacheKey,
        result: Result<CachedAudioHandle, FetchError>,
    ) {
        match self.session.complete_fetch(generation, result).await {
            Ok(()) => {}
            Err(PlaybackError::StaleCompletion) => {
                trace!(generation = %generation, key = %key, "Ignoring superseded fetch");
            }
            Err(PlaybackError::EngineLoadFailed(e)) => {
                warn!(key = %key, error = %e, "Device rejected narration audio");
                if let Err(e) = self.cache.invalidate(key).await {
                    warn!(key = %key, error = %e, "Failed to invalidate narration slot");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Narration did not start cleanly"),
        }
    }

    // ── Progress polling ───────────────────────────────────────────

    async fn poll(&mut self, generation: Generation) {
        match self.session.poll(generation).await {
            Ok(PollOutcome::Finished) => debug!(generation = %generation, "Narration finished"),
            Ok(_) | Err(PlaybackError::StaleCompletion) => {}
            Err(e) => warn!(error = %e, "Progress poll failed"),
        }
    }

    /// Run the poller exactly while narration is playing, tagged with the
    /// current generation.
    fn sync_poller(&mut self) {
        if !self.session.state().is_playing() {
            self.stop_poller();
            return;
        }
        let generation = self.session.generation();
        if self
            .poller
            .as_ref()
            .is_some_and(|poller| poller.generation == generation)
        {
            return;
        }
        self.start_poller(generation);
    }

    fn start_poller(&mut self, generation: Generation) {
        self.stop_poller();
        trace!(generation = %generation, "Progress poller started");

        let cmd_tx = self.cmd_tx.clone();
        let period = self.config.poll_interval;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(tx) = cmd_tx.upgrade() else { break };
                if tx.send(Command::Poll { generation }).is_err() {
                    break;
                }
            }
        });
        self.poller = Some(Poller { generation, task });
    }

    fn stop_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            trace!(generation = %poller.generation, "Progress poller stopped");
            poller.task.abort();
        }
    }

    // ── View ───────────────────────────────────────────────────────

    fn publish(&mut self) {
        while let Ok(event) = self.session_events.try_recv() {
            // No subscribers is fine.
            let _ = self.events_tx.send(event);
        }

        let view = self.build_view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn build_view(&self) -> PlaybackView {
        let ambience = *self.ambience_rx.borrow();
        let Some(story) = self.story.as_ref() else {
            return PlaybackView::empty(ambience);
        };

        let playback = self.session.state().clone();
        let word_count = story.word_count();
        let scrub_position_ms = self.session.scrub_position();
        let highlight = match (scrub_position_ms, playback.progress()) {
            (Some(scrub), Some((_, duration))) => highlight_cursor(scrub, duration, word_count),
            (None, Some((position, duration))) => highlight_cursor(position, duration, word_count),
            (_, None) => 0,
        };

        PlaybackView {
            session: Some(story.id()),
            playback,
            ambience,
            highlight,
            word_count,
            scrub_position_ms,
        }
    }
}
