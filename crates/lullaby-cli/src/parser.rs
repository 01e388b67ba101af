//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;

/// Bedtime stories, written and read aloud.
#[derive(Parser)]
#[command(name = "lullaby")]
#[command(about = "Generate bedtime stories and narrate them")]
#[command(version)]
pub struct Cli {
    /// Story service base URL
    #[arg(long = "api-url", env = "LULLABY_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
