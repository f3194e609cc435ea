mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use notewatch::config::NotewatchConfig;

#[derive(Parser)]
#[command(name = "notewatch", version, about = "Keep a vector-search index in sync with a directory of markdown notes")]
struct Cli {
    /// Config file to read instead of ~/.notewatch/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync once, then watch the notes directory until Ctrl-C
    Serve {
        /// Notes directory (overrides notes.dir)
        #[arg(long)]
        dir: Option<String>,
    },
    /// Run one full reconciliation pass and exit
    Sync {
        /// Notes directory (overrides notes.dir)
        #[arg(long)]
        dir: Option<String>,
    },
    /// Semantic search over indexed notes
    Search {
        query: String,
        /// Maximum number of results (defaults to search.default_limit)
        #[arg(long, short)]
        limit: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show index location, counts, and embedding model
    Status,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.notewatch/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NotewatchConfig::load_from(path)?,
        None => NotewatchConfig::load()?,
    };

    // Log to stderr so stdout stays clean for `search --json`.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { dir } => {
            override_notes_dir(&mut config, dir);
            cli::serve::serve(config).await?;
        }
        Command::Sync { dir } => {
            override_notes_dir(&mut config, dir);
            cli::sync::sync(&config).await?;
        }
        Command::Search { query, limit, json } => {
            cli::search::search(&config, &query, limit, json).await?;
        }
        Command::Status => cli::status::status(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}

fn override_notes_dir(config: &mut NotewatchConfig, dir: Option<String>) {
    if let Some(dir) = dir {
        config.notes.dir = Some(dir);
    }
}
