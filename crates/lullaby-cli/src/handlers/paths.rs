//! Paths command handler.
//!
//! Prints resolved locations in `key = value` form for diagnostics.

use anyhow::Result;
use lullaby_core::cache_dir_under;
use lullaby_remote::DEFAULT_BASE_URL;

use crate::bootstrap::CliConfig;

/// Resolved paths and the effective service URL, one `key = value` per line.
pub fn format_paths(config: &CliConfig) -> String {
    let api_url = config.api_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    format!(
        "data_root = {}\naudio_cache = {}\napi_url = {api_url}",
        config.data_root.display(),
        cache_dir_under(&config.data_root).display(),
    )
}

/// Execute the paths command.
pub fn execute(config: &CliConfig) -> Result<()> {
    println!("{}", format_paths(config));
    Ok(())
}
