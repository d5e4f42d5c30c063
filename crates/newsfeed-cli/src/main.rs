use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsfeed_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "newsfeed")]
#[command(author, version, about = "Paginated news search with an offline cache")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the latest articles, optionally filtered by a search term
    Feed {
        /// Search term (ignored when shorter than 3 characters)
        #[arg(short = 'q', long)]
        query: Option<String>,
        /// Number of pages to load
        #[arg(short = 'p', long, default_value_t = 1)]
        pages: u32,
    },
    /// Show the last successfully fetched articles from the cache
    Cached,
    /// Interactive session: page through, refresh and search
    Browse {
        /// Initial search term
        #[arg(short = 'q', long)]
        query: Option<String>,
    },
    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    tracing::debug!("Configuration path: {}", AppConfig::config_path().display());

    match cli.command {
        Some(Commands::Feed { query, pages }) => {
            commands::feed::run(&config, query.as_deref(), pages).await
        }
        Some(Commands::Cached) => commands::cached::run(&config).await,
        Some(Commands::Browse { query }) => {
            commands::browse::run(&config, query.as_deref()).await
        }
        // Default to an interactive session, like opening the feed screen
        None => commands::browse::run(&config, None).await,
        Some(Commands::Config { init }) => commands::config::run(&config, init),
    }
}
