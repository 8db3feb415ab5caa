use clap::{Parser, Subcommand};
use memcard_session::SessionConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

mod commands;
mod utils;

use commands::*;

#[derive(Parser)]
#[command(version, about = "Memory card CLI for SLE44xx cards behind a PC/SC reader")]
struct Cli {
    /// Optional TOML configuration file (MEMCARD_* variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    Readers,

    /// Wait for a card and show its record
    Status {
        /// Seconds to wait for a card
        #[arg(short, long, default_value_t = 30)]
        timeout: u64,
    },

    /// Print session events as they happen
    Watch {
        /// Stop after this many seconds (runs until interrupted if not specified)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Add credit to the card's regular account
    TopUp {
        /// Amount to add
        #[arg(required = true)]
        amount: u32,

        /// Seconds to wait for a card
        #[arg(short, long, default_value_t = 30)]
        timeout: u64,
    },

    /// Move the card to the admin account, zeroing its value
    ResetAdmin {
        /// Seconds to wait for a card
        #[arg(short, long, default_value_t = 30)]
        timeout: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Commands::Readers = cli.command {
        return list_readers();
    }

    let config = SessionConfig::load(cli.config.as_deref())?;
    debug!(?config, "Loaded configuration");

    match cli.command {
        Commands::Readers => unreachable!(), // Already handled above
        Commands::Status { timeout } => status_command(config, Duration::from_secs(timeout))?,
        Commands::Watch { duration } => watch_command(config, duration.map(Duration::from_secs))?,
        Commands::TopUp { amount, timeout } => {
            let target = config.regular_id;
            update_command(config, amount, target, Duration::from_secs(timeout))?
        }
        Commands::ResetAdmin { timeout } => {
            let target = config.admin_id;
            update_command(config, 0, target, Duration::from_secs(timeout))?
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
