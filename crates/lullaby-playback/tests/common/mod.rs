//! Shared fakes for the playback integration tests.
//!
//! No audio hardware or network is used: the synthesis fake returns canned
//! bytes, and the narration fake has a clock that only moves when a test
//! calls [`FakeNarration::advance`].

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lullaby_core::{
    CachedAudioHandle, FetchError, NarrationSettings, SettingsStore, SpeechSynthesisPort,
    SynthesisRequest, SynthesizedAudio,
};
use lullaby_playback::{
    AmbienceOutput, AudioCache, ControllerConfig, ControllerDeps, EngineError, EngineStatus,
    NarrationOutput, PlaybackController, PlaybackView,
};
use tempfile::TempDir;
use tokio::sync::Notify;

pub const WAIT: Duration = Duration::from_secs(5);
pub const POLL: Duration = Duration::from_millis(10);
pub const STORY: &str = "Once upon a time a small fox curled up under the silver moon and slept";
pub const OTHER_STORY: &str = "The sleepy whale sang one last song to the stars";

// ── Synthesis ──────────────────────────────────────────────────────

/// What the fake TTS service answers.
#[derive(Debug, Clone)]
pub enum SynthesisReply {
    Bytes(Vec<u8>),
    Reference { url: String, bytes: Vec<u8> },
    Fail(FetchError),
}

pub struct FakeSynthesis {
    reply: Mutex<SynthesisReply>,
    gate: Mutex<Option<Arc<Notify>>>,
    synth_calls: AtomicUsize,
    download_calls: AtomicUsize,
    voices: Mutex<Vec<String>>,
}

impl FakeSynthesis {
    pub fn new(reply: SynthesisReply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            gate: Mutex::new(None),
            synth_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            voices: Mutex::new(Vec::new()),
        })
    }

    pub fn bytes() -> Arc<Self> {
        Self::new(SynthesisReply::Bytes(b"ID3-fake-narration".to_vec()))
    }

    pub fn set_reply(&self, reply: SynthesisReply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Hold every `synthesize` call until the returned notify is signalled.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn synth_calls(&self) -> usize {
        self.synth_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesisPort for FakeSynthesis {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio, FetchError> {
        self.synth_calls.fetch_add(1, Ordering::SeqCst);
        self.voices.lock().unwrap().push(request.voice.clone());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            SynthesisReply::Bytes(bytes) => Ok(SynthesizedAudio::Bytes(bytes)),
            SynthesisReply::Reference { url, .. } => Ok(SynthesizedAudio::Reference(url)),
            SynthesisReply::Fail(e) => Err(e),
        }
    }

    async fn download(&self, reference: &str) -> Result<Vec<u8>, FetchError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            SynthesisReply::Reference { url, bytes } if url == reference => Ok(bytes),
            _ => Err(FetchError::Service {
                status: 404,
                message: format!("unknown reference {reference}"),
            }),
        }
    }
}

// ── Narration ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Track {
    path: PathBuf,
    playing: bool,
    position_ms: u64,
    finished: bool,
    finish_reported: bool,
}

/// Narration output with a manually advanced clock.
pub struct FakeNarration {
    track: Mutex<Option<Track>>,
    duration_ms: AtomicU64,
    fail_load: AtomicBool,
    fail_transport: AtomicBool,
    loads: AtomicUsize,
    plays: AtomicUsize,
    pauses: AtomicUsize,
    unloads: AtomicUsize,
    status_calls: AtomicUsize,
    seeks: Mutex<Vec<u64>>,
}

impl FakeNarration {
    pub fn new(duration_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            track: Mutex::new(None),
            duration_ms: AtomicU64::new(duration_ms),
            fail_load: AtomicBool::new(false),
            fail_transport: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            plays: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            seeks: Mutex::new(Vec::new()),
        })
    }

    /// Move the clock forward; a playing track advances by `ms`.
    pub fn advance(&self, ms: u64) {
        let duration = self.duration_ms.load(Ordering::SeqCst);
        if let Some(track) = self.track.lock().unwrap().as_mut() {
            if track.playing {
                track.position_ms += ms;
                if duration > 0 && track.position_ms >= duration {
                    track.position_ms = duration;
                    track.playing = false;
                    track.finished = true;
                }
            }
        }
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }

    pub fn is_loaded(&self) -> bool {
        self.track.lock().unwrap().is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.track.lock().unwrap().as_ref().is_some_and(|t| t.playing)
    }

    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.track.lock().unwrap().as_ref().map(|t| t.path.clone())
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    /// Number of progress polls that reached the device.
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.seeks.lock().unwrap().clone()
    }

    fn check_transport(&self) -> Result<(), EngineError> {
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(EngineError::Transport("device unplugged".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NarrationOutput for FakeNarration {
    async fn load(&self, handle: &CachedAudioHandle) -> Result<u64, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(EngineError::Load("unsupported format".into()));
        }
        *self.track.lock().unwrap() = Some(Track {
            path: handle.path().to_path_buf(),
            ..Track::default()
        });
        Ok(self.duration_ms.load(Ordering::SeqCst))
    }

    async fn play(&self) -> Result<(), EngineError> {
        self.check_transport()?;
        self.plays.fetch_add(1, Ordering::SeqCst);
        let mut track = self.track.lock().unwrap();
        let track = track.as_mut().ok_or(EngineError::NotLoaded)?;
        if !track.finished {
            track.playing = true;
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.check_transport()?;
        self.pauses.fetch_add(1, Ordering::SeqCst);
        let mut track = self.track.lock().unwrap();
        track.as_mut().ok_or(EngineError::NotLoaded)?.playing = false;
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> Result<(), EngineError> {
        self.check_transport()?;
        self.seeks.lock().unwrap().push(position_ms);
        let duration = self.duration_ms.load(Ordering::SeqCst);
        let mut track = self.track.lock().unwrap();
        let track = track.as_mut().ok_or(EngineError::NotLoaded)?;
        track.position_ms = if duration > 0 {
            position_ms.min(duration)
        } else {
            position_ms
        };
        track.finished = false;
        track.finish_reported = false;
        Ok(())
    }

    async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let duration_ms = self.duration_ms.load(Ordering::SeqCst);
        let mut track = self.track.lock().unwrap();
        let track = track.as_mut().ok_or(EngineError::NotLoaded)?;
        let did_just_finish = track.finished && !track.finish_reported;
        if did_just_finish {
            track.finish_reported = true;
        }
        Ok(EngineStatus {
            position_ms: track.position_ms,
            duration_ms,
            did_just_finish,
        })
    }

    async fn unload(&self) -> Result<(), EngineError> {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        *self.track.lock().unwrap() = None;
        Ok(())
    }
}

// ── Ambience ───────────────────────────────────────────────────────

pub struct FakeAmbience {
    looping: Mutex<Option<f32>>,
    start_gate: Mutex<Option<Arc<Notify>>>,
    fail_start: AtomicBool,
    fail_volume: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    volumes: Mutex<Vec<f32>>,
}

impl FakeAmbience {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            looping: Mutex::new(None),
            start_gate: Mutex::new(None),
            fail_start: AtomicBool::new(false),
            fail_volume: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            volumes: Mutex::new(Vec::new()),
        })
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Reject live volume changes, as a device that went away would.
    pub fn set_fail_volume(&self, fail: bool) {
        self.fail_volume.store(fail, Ordering::SeqCst);
    }

    /// Hold every `start_loop` call until the returned notify is signalled.
    pub fn hold_start(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn looping_volume(&self) -> Option<f32> {
        *self.looping.lock().unwrap()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.volumes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AmbienceOutput for FakeAmbience {
    async fn start_loop(&self, _asset: &Path, volume: f32) -> Result<(), EngineError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let gate = self.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(EngineError::Load("ambience asset missing".into()));
        }
        *self.looping.lock().unwrap() = Some(volume);
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<(), EngineError> {
        self.volumes.lock().unwrap().push(volume);
        if self.fail_volume.load(Ordering::SeqCst) {
            return Err(EngineError::Transport("ambience device lost".into()));
        }
        let mut looping = self.looping.lock().unwrap();
        match looping.as_mut() {
            Some(current) => {
                *current = volume;
                Ok(())
            }
            None => Err(EngineError::NotLoaded),
        }
    }

    async fn stop_loop(&self) -> Result<(), EngineError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.looping.lock().unwrap() = None;
        Ok(())
    }
}

// ── Controller harness ─────────────────────────────────────────────

pub struct Harness {
    pub controller: PlaybackController,
    pub synthesis: Arc<FakeSynthesis>,
    pub narration: Arc<FakeNarration>,
    pub ambience: Arc<FakeAmbience>,
    pub settings: SettingsStore,
    pub cache: AudioCache,
    _dir: TempDir,
}

impl Harness {
    pub fn new(duration_ms: u64) -> Self {
        Self::with(FakeSynthesis::bytes(), duration_ms, NarrationSettings::default())
    }

    pub fn with(
        synthesis: Arc<FakeSynthesis>,
        duration_ms: u64,
        settings: NarrationSettings,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let narration = FakeNarration::new(duration_ms);
        let ambience = FakeAmbience::new();
        let settings = SettingsStore::new(settings).unwrap();
        let cache = AudioCache::new(dir.path().join("audio-cache"), synthesis.clone());

        let controller = PlaybackController::spawn(
            ControllerDeps {
                cache: cache.clone(),
                narration: narration.clone(),
                ambience: ambience.clone(),
                ambience_asset: Some(PathBuf::from("assets/rain.mp3")),
            },
            settings.clone(),
            ControllerConfig {
                poll_interval: POLL,
                ..ControllerConfig::default()
            },
        );

        Self {
            controller,
            synthesis,
            narration,
            ambience,
            settings,
            cache,
            _dir: dir,
        }
    }

    pub async fn wait_for(
        &self,
        what: &str,
        pred: impl FnMut(&PlaybackView) -> bool,
    ) -> PlaybackView {
        wait_for_view(&self.controller, what, pred).await
    }
}

/// Wait until the controller's view satisfies `pred`, or panic after [`WAIT`].
pub async fn wait_for_view(
    controller: &PlaybackController,
    what: &str,
    pred: impl FnMut(&PlaybackView) -> bool,
) -> PlaybackView {
    let mut rx = controller.subscribe();
    match tokio::time::timeout(WAIT, rx.wait_for(pred)).await {
        Ok(Ok(view)) => view.clone(),
        Ok(Err(_)) => panic!("controller closed while waiting for {what}"),
        Err(_) => panic!("timed out waiting for {what}; last view: {:?}", controller.view()),
    }
}

/// Let the poller run a few intervals.
pub async fn settle() {
    tokio::time::sleep(POLL * 5).await;
}

/// Wait until `cond` holds, or panic after [`WAIT`].
pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
