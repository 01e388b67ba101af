//! Fetch-or-get cache for synthesized narration audio.
//!
//! Each cache key maps to one slot file `<dir>/<key>.<ext>`. A key is fetched
//! from the synthesis service at most once at a time: callers that arrive
//! while a fetch is running share its result. Failed fetches are not cached,
//! so the next call for the key goes to the network again.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use lullaby_core::{
    CacheKey, CachedAudioHandle, FetchError, SpeechSynthesisPort, SynthesisRequest,
    SynthesizedAudio,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Slot file extension used when none is configured.
pub const DEFAULT_AUDIO_EXTENSION: &str = "mp3";

type SharedFetch = Shared<BoxFuture<'static, Result<CachedAudioHandle, FetchError>>>;

/// Narration audio cache. Cloning shares the same cache.
#[derive(Clone)]
pub struct AudioCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    dir: PathBuf,
    extension: String,
    synthesis: Arc<dyn SpeechSynthesisPort>,
    slots: Mutex<Slots>,
}

#[derive(Default)]
struct Slots {
    ready: HashMap<CacheKey, CachedAudioHandle>,
    in_flight: HashMap<CacheKey, SharedFetch>,
}

impl AudioCache {
    /// Cache storing slots under `dir`, fetching through `synthesis`.
    pub fn new(dir: impl Into<PathBuf>, synthesis: Arc<dyn SpeechSynthesisPort>) -> Self {
        Self::with_extension(dir, synthesis, DEFAULT_AUDIO_EXTENSION)
    }

    pub fn with_extension(
        dir: impl Into<PathBuf>,
        synthesis: Arc<dyn SpeechSynthesisPort>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                dir: dir.into(),
                extension: extension.into(),
                synthesis,
                slots: Mutex::new(Slots::default()),
            }),
        }
    }

    /// Path of the slot file for `key`.
    #[must_use]
    pub fn slot_path(&self, key: &CacheKey) -> PathBuf {
        self.inner.dir.join(key.file_name(&self.inner.extension))
    }

    /// Return the handle for `key`, fetching it with `request` if needed.
    ///
    /// - known handle: returned without any network call
    /// - fetch already running for `key`: its result is shared
    /// - otherwise a new fetch is started
    pub async fn fetch_or_get(
        &self,
        key: &CacheKey,
        request: SynthesisRequest,
    ) -> Result<CachedAudioHandle, FetchError> {
        let fetch = {
            let mut slots = self.inner.slots.lock().await;
            if let Some(handle) = slots.ready.get(key) {
                debug!(key = %key, "Narration cache hit");
                return Ok(handle.clone());
            }

            if let Some(fetch) = slots.in_flight.get(key) {
                debug!(key = %key, "Joining in-flight narration fetch");
                fetch.clone()
            } else {
                let fetch = self.spawn_fetch(key.clone(), request);
                slots.in_flight.insert(key.clone(), fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    /// Cached handle for `key`, if one is ready.
    pub async fn cached(&self, key: &CacheKey) -> Option<CachedAudioHandle> {
        self.inner.slots.lock().await.ready.get(key).cloned()
    }

    /// Whether a fetch for `key` is running.
    pub async fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.inner.slots.lock().await.in_flight.contains_key(key)
    }

    /// Forget `key` and delete its slot file.
    ///
    /// Used when the device rejects the cached bytes, so that a retry
    /// re-fetches instead of replaying them.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<(), FetchError> {
        self.inner.slots.lock().await.ready.remove(key);

        let path = self.slot_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(key = %key, "Narration cache slot invalidated");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&path, &e)),
        }
    }

    /// Start the fetch task for `key`. Must be called with the slot lock held
    /// so the in-flight entry is registered before the task can finish.
    fn spawn_fetch(&self, key: CacheKey, request: SynthesisRequest) -> SharedFetch {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.resolve(&key, &request).await;

            let mut slots = inner.slots.lock().await;
            slots.in_flight.remove(&key);
            match &result {
                Ok(handle) => {
                    slots.ready.insert(key, handle.clone());
                }
                Err(e) => warn!(key = %key, error = %e, "Narration fetch failed"),
            }
            result
        });

        async move { task.await.unwrap_or(Err(FetchError::Abandoned)) }
            .boxed()
            .shared()
    }
}

impl CacheInner {
    async fn resolve(
        &self,
        key: &CacheKey,
        request: &SynthesisRequest,
    ) -> Result<CachedAudioHandle, FetchError> {
        let path = self.dir.join(key.file_name(&self.extension));

        if let Some(len) = existing_slot_len(&path).await {
            debug!(key = %key, path = %path.display(), "Reusing narration slot from disk");
            return Ok(CachedAudioHandle::new(key.clone(), path, len));
        }

        info!(key = %key, voice = %request.voice, "Fetching narration audio");
        let bytes = match self.synthesis.synthesize(request).await? {
            SynthesizedAudio::Bytes(bytes) => bytes,
            SynthesizedAudio::Reference(reference) => {
                debug!(key = %key, reference = %reference, "Downloading narration reference");
                self.synthesis.download(&reference).await?
            }
        };

        if bytes.is_empty() {
            return Err(FetchError::InvalidResponse {
                message: "synthesis returned no audio".to_string(),
            });
        }

        write_slot(&self.dir, &path, &bytes).await?;
        info!(key = %key, bytes = bytes.len(), "Narration audio cached");

        Ok(CachedAudioHandle::new(key.clone(), path, bytes.len() as u64))
    }
}

/// Size of a complete slot file, if one exists and is non-empty.
async fn existing_slot_len(path: &Path) -> Option<u64> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    (meta.is_file() && meta.len() > 0).then_some(meta.len())
}

/// Write `bytes` to a `.part` sibling and rename it over `path`.
async fn write_slot(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| storage_error(dir, &e))?;

    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    tokio::fs::write(&part, bytes)
        .await
        .map_err(|e| storage_error(&part, &e))?;

    if let Err(e) = tokio::fs::rename(&part, path).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(storage_error(path, &e));
    }
    Ok(())
}

fn storage_error(path: &Path, e: &std::io::Error) -> FetchError {
    FetchError::Storage {
        message: format!("{}: {e}", path.display()),
    }
}
