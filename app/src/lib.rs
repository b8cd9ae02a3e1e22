//! PhoneProbe application shell
//!
//! Thin shell that loads configuration, opens the database and dispatches
//! command-line requests to the scan orchestrator. Core logic lives in the
//! `crates/` directory.

pub mod commands;
pub mod state;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

pub use commands::parse_bulk_file;
pub use state::AppState;

/// Probe image endpoints for phone identifiers.
#[derive(Debug, Parser)]
#[command(name = "phoneprobe", version, about)]
pub struct Cli {
    /// Config file (defaults to the XDG config path)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides config and environment)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan one phone number
    Scan {
        /// Phone number in any format
        phone: String,
        /// Country code prefix, e.g. 1 or 44
        #[arg(short, long)]
        country: String,
    },
    /// Scan a file of `phone,country` lines sequentially
    Bulk {
        /// Input file; blank lines and `#` comments are skipped
        file: PathBuf,
        /// Country code for lines without one
        #[arg(short, long)]
        country: Option<String>,
    },
    /// Show the record for an identifier, or the most recent records
    History {
        /// Normalized identifier (country code + digits)
        identifier: Option<String>,
    },
    /// Show aggregate statistics
    Stats,
    /// Delete the stored record for an identifier
    Forget {
        /// Normalized identifier (country code + digits)
        identifier: String,
    },
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,phoneprobe=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Parse arguments, run the requested command and print JSON to stdout.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    info!("Starting PhoneProbe v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let state = AppState::init(cli.config.as_deref(), cli.database.as_deref()).await?;
        let output = commands::dispatch(&state, cli.command).await;
        state.shutdown().await;

        println!("{}", serde_json::to_string_pretty(&output?)?);
        Ok(())
    })
}
