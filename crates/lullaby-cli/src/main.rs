//! CLI entry point - the composition root.
//!
//! Parses arguments, installs logging, bootstraps the context and dispatches
//! to a handler. Errors carrying a [`CliError`] pick the exit code.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use lullaby_cli::handlers::tell::TellArgs;
use lullaby_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before parsing so env-backed flags see it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug, else warnings only.
/// Logs go to stderr so stdout carries only the story.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "lullaby=debug,lullaby_cli=debug,lullaby_playback=debug,lullaby_remote=debug,lullaby_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        // No command provided - show help
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::with_defaults()?.with_api_url(cli.api_url);

    match command {
        Commands::Paths => handlers::paths::execute(&config)?,
        Commands::Tell {
            prompt,
            story,
            listen,
            narration,
        } => {
            let ctx = bootstrap(config)?;
            let args = TellArgs {
                prompt,
                story,
                listen,
                narration,
            };
            handlers::tell::execute(&ctx, args).await?;
        }
        Commands::Narrate { file, narration } => {
            let ctx = bootstrap(config)?;
            handlers::narrate::execute(&ctx, &file, narration).await?;
        }
    }

    Ok(())
}
