use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use headline_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "headline")]
#[command(author, version, about = "Aggregate news feeds into a single digest page")]
struct Cli {
    /// Config file (defaults to ~/.config/headline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fetch scheduler and IPC server until interrupted
    Serve,
    /// Stop a running daemon
    Stop,
    /// Run a single fetch cycle and write the page
    Once {
        /// Write the page here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Register a feed
    Add {
        /// Unique feed name, also the section title
        #[arg(short = 'n', long)]
        name: String,
        /// Feed URL (RSS or Atom)
        #[arg(short = 'u', long)]
        url: String,
    },
    /// List registered feeds
    List,
    /// Show daemon status and failing feeds
    Status,
    /// Register every feed from an OPML file
    Import {
        /// Path to the OPML file
        file: PathBuf,
    },
    /// Print the current page
    Page,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Logs go to stderr so `page` and `once` can be piped
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Serve => commands::daemon::start(config).await,
        Commands::Stop => commands::daemon::stop().await,
        Commands::Once { output } => commands::once::run(&config, output.as_deref()).await,
        Commands::Add { name, url } => commands::add::run(&config, &name, &url).await,
        Commands::List => commands::list::run(&config).await,
        Commands::Status => commands::status::run(&config).await,
        Commands::Import { file } => commands::import::run(&config, &file).await,
        Commands::Page => commands::page::run(&config).await,
    }
}
