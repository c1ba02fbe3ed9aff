use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notion_brain::Result;
use notion_brain::commands::{
    ask, delete_page, health_check, route, show_config, show_stats, sync,
};
use notion_brain::config::get_config_dir;

#[derive(Parser)]
#[command(name = "notion-brain")]
#[command(about = "A personal knowledge base: index Notion databases and ask questions over them")]
#[command(version)]
struct Cli {
    /// Override the configuration directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync Notion databases into the knowledge base
    Sync {
        /// Sync only this database id (defaults to all configured databases)
        #[arg(long)]
        database: Option<String>,
        /// Re-index pages even when they are unchanged
        #[arg(long)]
        force: bool,
        /// Maximum number of pages to process
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Ask a question over the indexed knowledge base
    Ask {
        /// The question to answer
        question: String,
    },
    /// Classify a free-form message and either answer it or trigger a sync
    Route {
        /// The message to interpret
        message: String,
    },
    /// Show knowledge base statistics
    Stats,
    /// Check connectivity to Notion, the embedding server, and the store
    Health,
    /// Delete all stored chunks for a page
    Delete {
        /// Page id to remove
        page_id: String,
    },
    /// Show the current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Sync {
            database,
            force,
            limit,
        } => {
            sync(&config_dir, database, force, limit).await?;
        }
        Commands::Ask { question } => {
            ask(&config_dir, &question).await?;
        }
        Commands::Route { message } => {
            route(&config_dir, &message).await?;
        }
        Commands::Stats => {
            show_stats(&config_dir).await?;
        }
        Commands::Health => {
            health_check(&config_dir).await?;
        }
        Commands::Delete { page_id } => {
            delete_page(&config_dir, &page_id).await?;
        }
        Commands::Config => {
            show_config(&config_dir)?;
        }
    }

    Ok(())
}
