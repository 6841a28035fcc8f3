//! Tracepipe - trace session persistence daemon
//!
//! # Usage
//!
//! ```bash
//! # Run the ingest daemon (default)
//! tracepipe
//! tracepipe serve --config configs/config.toml
//!
//! # Consume persisted trace messages from the broker
//! tracepipe consume --config configs/config.toml
//! ```

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracepipe_config::{LogConfig, LogFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Tracepipe - trace session persistence daemon
#[derive(Parser, Debug)]
#[command(name = "tracepipe")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    // Used by the default serve invocation; the subcommands declare
    // their own copies
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/config.toml")]
    config: std::path::PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingest daemon
    Serve(cmd::serve::ServeArgs),

    /// Consume persisted trace messages from the broker
    Consume(cmd::consume::ConsumeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(args)) => cmd::serve::run(args).await,
        Some(Command::Consume(args)) => cmd::consume::run(args).await,
        // No subcommand = run the daemon (default behavior)
        None => {
            let args = cmd::serve::ServeArgs {
                config: cli.config,
                log_level: cli.log_level,
            };
            cmd::serve::run(args).await
        }
    }
}

/// Initialize the tracing subscriber for logging
///
/// The level from the config file can be overridden on the command line.
pub(crate) fn init_logging(config: &LogConfig, override_level: Option<&str>) -> Result<()> {
    let level = override_level.unwrap_or_else(|| config.level.as_str());
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
    }

    Ok(())
}
