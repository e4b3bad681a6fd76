//! Reelplay CLI - Headless front-end for the playback engine
//!
//! Features:
//! - Catalog search with grouped results
//! - Source probing and ranking
//! - Playlist discontinuity filtering
//! - Score calculation for a single probe result

use clap::{Parser, Subcommand};
use reelplay_core::SessionConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

mod commands;
mod output;

/// Reelplay CLI - multi-source video toolkit
#[derive(Parser)]
#[command(name = "reelplay")]
#[command(version)]
#[command(about = "Search, probe and rank video sources", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Base URL of the catalog API
    #[arg(long, env = "REELPLAY_API", default_value = "http://localhost:3000/")]
    api: Url,

    /// Session configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search all sources and group results by title
    Search {
        /// Search query
        query: String,

        /// Only keep results from this year
        #[arg(short, long)]
        year: Option<String>,

        /// Only keep movies or series (movie, tv)
        #[arg(short, long)]
        kind: Option<String>,

        /// List every result instead of grouping
        #[arg(long)]
        all: bool,
    },

    /// Probe every source of a title and pick the best one
    Probe {
        /// Exact title
        title: String,

        #[arg(short, long)]
        year: Option<String>,

        /// movie or tv
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Strip discontinuity markers from a playlist
    Filter {
        /// Playlist file, or - for stdin
        input: String,
    },

    /// Score one probe result
    Score {
        /// Quality label (4K, 2K, 1080p, 720p, 480p, SD)
        #[arg(short, long)]
        quality: String,

        /// Load speed, e.g. "2.0 MB/s"
        #[arg(short, long)]
        speed: String,

        /// Ping in milliseconds
        #[arg(short, long)]
        ping: u32,

        #[arg(long, default_value = "1024")]
        max_speed: f64,

        #[arg(long, default_value = "50")]
        min_ping: f64,

        #[arg(long, default_value = "1000")]
        max_ping: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    reelplay_core::init();
    let config = SessionConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Search { query, year, kind, all } => {
            commands::search(&cli.api, &config, &query, year, kind, all, &cli.format).await?;
        }
        Commands::Probe { title, year, kind } => {
            commands::probe(&cli.api, &config, &title, year, kind, &cli.format).await?;
        }
        Commands::Filter { input } => {
            commands::filter(&input)?;
        }
        Commands::Score { quality, speed, ping, max_speed, min_ping, max_ping } => {
            commands::score(&quality, &speed, ping, max_speed, min_ping, max_ping, &cli.format)?;
        }
    }

    Ok(())
}
