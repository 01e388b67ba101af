#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]
// DefaultStoryClient is used through the core port traits, not its generic
// structure.
#![allow(private_interfaces)]

mod client;
mod config;
mod error;
mod http;
mod models;
mod parsing;
mod port;
mod url;

// ============================================================================
// Public API
// ============================================================================

pub use client::DefaultStoryClient;
pub use config::{DEFAULT_BASE_URL, RemoteClientConfig};
pub use error::{RemoteError, RemoteResult};
