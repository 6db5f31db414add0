use std::sync::Arc;

use anyhow::Result;
use armory_core::FetchParams;
use armory_storage::{CacheStore, ItemStore, MemoryStore};
use armory_sync::{SyncConfig, SyncService};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "armory-cli")]
#[command(about = "Armory item sync command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// One-shot fetch-and-sync against the upstream item API.
    Sync {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        item_type: Option<String>,
        #[arg(long)]
        min_level: Option<u32>,
    },
    /// Serve the JSON API, with the cron scheduler when enabled.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync {
        category: None,
        item_type: None,
        min_level: None,
    }) {
        Commands::Sync {
            category,
            item_type,
            min_level,
        } => {
            let store = Arc::new(MemoryStore::new());
            let service = SyncService::new(
                SyncConfig::from_env(),
                store.clone() as Arc<dyn ItemStore>,
                store as Arc<dyn CacheStore>,
            )?;
            let params = FetchParams {
                category,
                item_type,
                min_level,
                ..Default::default()
            };
            let summary = service.fetch_and_sync(&params).await?;
            println!(
                "sync complete: run_id={} from_cache={} extracted={} synced={}",
                summary.run_id,
                summary.from_cache,
                summary.extracted,
                summary.item_ids.len()
            );
        }
        Commands::Serve => {
            armory_web::serve_from_env().await?;
        }
    }

    Ok(())
}
