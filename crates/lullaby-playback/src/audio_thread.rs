//! Dedicated audio thread: keeps `!Send` rodio resources off the async runtime.
//!
//! `rodio::OutputStream` is `!Send` on some platforms. It is created on a
//! single OS thread together with the narration and ambience sinks, and every
//! operation is routed there as an [`AudioCommand`]. Replies travel back on
//! `tokio::sync::oneshot` channels so async callers can await them.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::oneshot;

use crate::audio_io::EngineStatus;
use crate::error::EngineError;

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

// ── Commands ───────────────────────────────────────────────────────

enum AudioCommand {
    /// Decode a file into a fresh, paused narration sink.
    Load { path: PathBuf, reply: Reply<u64> },
    Play { reply: Reply<()> },
    Pause { reply: Reply<()> },
    Seek { position_ms: u64, reply: Reply<()> },
    Status { reply: Reply<EngineStatus> },
    Unload { reply: Reply<()> },

    StartAmbience {
        path: PathBuf,
        volume: f32,
        reply: Reply<()>,
    },
    SetAmbienceVolume { volume: f32, reply: Reply<()> },
    StopAmbience { reply: Reply<()> },

    /// Release every sink and the output stream.
    Shutdown,
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the audio thread.
///
/// All methods take `&self`. Dropping the handle shuts the thread down and
/// joins it.
pub struct AudioThreadHandle {
    cmd_tx: mpsc::Sender<AudioCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AudioThreadHandle {
    /// Spawn the audio thread and open the default output device on it.
    ///
    /// Blocks until the device is open; device errors are returned here.
    pub fn spawn() -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), EngineError>>();

        let thread = thread::Builder::new()
            .name("lullaby-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx))
            .map_err(|e| EngineError::Output(format!("failed to spawn audio thread: {e}")))?;

        init_rx.recv().map_err(|_| EngineError::AudioThreadDied)??;

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }

    // ── Narration ──────────────────────────────────────────────────

    pub async fn load(&self, path: &Path) -> Result<u64, EngineError> {
        let path = path.to_path_buf();
        self.request(|reply| AudioCommand::Load { path, reply }).await
    }

    pub async fn play(&self) -> Result<(), EngineError> {
        self.request(|reply| AudioCommand::Play { reply }).await
    }

    pub async fn pause(&self) -> Result<(), EngineError> {
        self.request(|reply| AudioCommand::Pause { reply }).await
    }

    pub async fn seek(&self, position_ms: u64) -> Result<(), EngineError> {
        self.request(|reply| AudioCommand::Seek { position_ms, reply })
            .await
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| AudioCommand::Status { reply }).await
    }

    pub async fn unload(&self) -> Result<(), EngineError> {
        self.request(|reply| AudioCommand::Unload { reply }).await
    }

    // ── Ambience ───────────────────────────────────────────────────

    pub async fn start_ambience(&self, path: &Path, volume: f32) -> Result<(), EngineError> {
        let path = path.to_path_buf();
        self.request(|reply| AudioCommand::StartAmbience {
            path,
            volume,
            reply,
        })
        .await
    }

    pub async fn set_ambience_volume(&self, volume: f32) -> Result<(), EngineError> {
        self.request(|reply| AudioCommand::SetAmbienceVolume { volume, reply })
            .await
    }

    pub async fn stop_ambience(&self) -> Result<(), EngineError> {
        self.request(|reply| AudioCommand::StopAmbience { reply })
            .await
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Send a command and await its reply. Channel failures map to
    /// [`EngineError::AudioThreadDied`].
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> AudioCommand,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .map_err(|_| EngineError::AudioThreadDied)?;
        rx.await.map_err(|_| EngineError::AudioThreadDied)?
    }

    // ── Audio thread event loop ────────────────────────────────────

    fn run(cmd_rx: &mpsc::Receiver<AudioCommand>, init_tx: &mpsc::Sender<Result<(), EngineError>>) {
        let mut device = match AudioDevice::open() {
            Ok(device) => device,
            Err(e) => {
                let _ = init_tx.send(Err(e));
                return;
            }
        };

        if init_tx.send(Ok(())).is_err() {
            return;
        }

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::Load { path, reply } => {
                    let _ = reply.send(device.load(&path));
                }
                AudioCommand::Play { reply } => {
                    let _ = reply.send(device.with_track(|track| {
                        track.sink.play();
                        Ok(())
                    }));
                }
                AudioCommand::Pause { reply } => {
                    let _ = reply.send(device.with_track(|track| {
                        track.sink.pause();
                        Ok(())
                    }));
                }
                AudioCommand::Seek { position_ms, reply } => {
                    let _ = reply.send(device.with_track(|track| track.seek(position_ms)));
                }
                AudioCommand::Status { reply } => {
                    let _ = reply.send(device.with_track(|track| Ok(track.status())));
                }
                AudioCommand::Unload { reply } => {
                    device.unload();
                    let _ = reply.send(Ok(()));
                }
                AudioCommand::StartAmbience {
                    path,
                    volume,
                    reply,
                } => {
                    let _ = reply.send(device.start_ambience(&path, volume));
                }
                AudioCommand::SetAmbienceVolume { volume, reply } => {
                    let result = device
                        .ambience
                        .as_ref()
                        .map_or(Err(EngineError::NotLoaded), |sink| {
                            sink.set_volume(volume);
                            Ok(())
                        });
                    let _ = reply.send(result);
                }
                AudioCommand::StopAmbience { reply } => {
                    if let Some(sink) = device.ambience.take() {
                        sink.stop();
                    }
                    let _ = reply.send(Ok(()));
                }
                AudioCommand::Shutdown => break,
            }
        }

        // Sinks and the output stream are dropped here, on the audio thread.
        tracing::debug!("Audio thread shutting down");
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

// ── Thread-local device state ──────────────────────────────────────

struct AudioDevice {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    narration: Option<NarrationTrack>,
    ambience: Option<Sink>,
}

struct NarrationTrack {
    sink: Sink,
    duration_ms: u64,
    finish_reported: bool,
}

impl AudioDevice {
    fn open() -> Result<Self, EngineError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| EngineError::Output(e.to_string()))?;

        tracing::info!("Audio output initialized on default device");

        Ok(Self {
            _stream: stream,
            stream_handle,
            narration: None,
            ambience: None,
        })
    }

    fn load(&mut self, path: &Path) -> Result<u64, EngineError> {
        self.unload();

        let file = File::open(path).map_err(|e| EngineError::Load(e.to_string()))?;
        let source =
            Decoder::new(BufReader::new(file)).map_err(|e| EngineError::Load(e.to_string()))?;
        let duration_ms = source.total_duration().map_or(0, duration_to_ms);

        let sink =
            Sink::try_new(&self.stream_handle).map_err(|e| EngineError::Output(e.to_string()))?;
        sink.pause();
        sink.append(source);

        tracing::debug!(path = %path.display(), duration_ms, "Narration track loaded");
        self.narration = Some(NarrationTrack {
            sink,
            duration_ms,
            finish_reported: false,
        });
        Ok(duration_ms)
    }

    fn unload(&mut self) {
        if let Some(track) = self.narration.take() {
            track.sink.stop();
            tracing::debug!("Narration track unloaded");
        }
    }

    fn with_track<T>(
        &mut self,
        f: impl FnOnce(&mut NarrationTrack) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        self.narration.as_mut().map_or(Err(EngineError::NotLoaded), f)
    }

    fn start_ambience(&mut self, path: &Path, volume: f32) -> Result<(), EngineError> {
        if let Some(sink) = self.ambience.take() {
            sink.stop();
        }

        let file = File::open(path).map_err(|e| EngineError::Load(e.to_string()))?;
        let source = Decoder::new_looped(BufReader::new(file))
            .map_err(|e| EngineError::Load(e.to_string()))?;

        let sink =
            Sink::try_new(&self.stream_handle).map_err(|e| EngineError::Output(e.to_string()))?;
        sink.set_volume(volume);
        sink.append(source);

        self.ambience = Some(sink);
        Ok(())
    }
}

impl NarrationTrack {
    fn seek(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.sink
            .try_seek(Duration::from_millis(position_ms))
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        self.finish_reported = false;
        Ok(())
    }

    fn status(&mut self) -> EngineStatus {
        let mut position_ms = duration_to_ms(self.sink.get_pos());
        if self.duration_ms > 0 {
            position_ms = position_ms.min(self.duration_ms);
        }

        // An empty sink has drained its only source.
        let drained = self.sink.empty();
        let did_just_finish = drained && !self.finish_reported;
        if did_just_finish {
            self.finish_reported = true;
            if self.duration_ms > 0 {
                position_ms = self.duration_ms;
            }
        }

        EngineStatus {
            position_ms,
            duration_ms: self.duration_ms,
            did_just_finish,
        }
    }
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
