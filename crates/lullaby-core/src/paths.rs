//! Data directory resolution.
//!
//! Layout under the data root:
//! - `audio-cache/` - one slot file per narration cache key

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "LULLABY_DATA_DIR";

/// Directory name of the audio cache under the data root.
pub const AUDIO_CACHE_DIR: &str = "audio-cache";

/// Errors that can occur during path resolution and directory operations.
#[derive(Debug, Error)]
pub enum PathError {
    /// Could not determine the system data directory.
    #[error("Cannot determine system data directory")]
    NoDataDir,

    /// A path was expected to be a directory but was not.
    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

/// Get the root directory for application data.
///
/// Resolution order:
/// 1. `LULLABY_DATA_DIR` environment variable
/// 2. System local data directory (e.g. `~/.local/share/lullaby`)
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Some(path) = env::var_os(DATA_DIR_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let data_dir = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    Ok(data_dir.join("lullaby"))
}

/// Directory holding narration cache slots.
pub fn audio_cache_dir() -> Result<PathBuf, PathError> {
    Ok(cache_dir_under(&data_root()?))
}

/// Audio cache directory for a given data root.
#[must_use]
pub fn cache_dir_under(root: &Path) -> PathBuf {
    root.join(AUDIO_CACHE_DIR)
}

/// Ensure `path` exists as a directory, creating it and its parents if missing.
pub fn ensure_directory(path: &Path) -> Result<(), PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
