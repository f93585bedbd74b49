//! Cache command - manage the review result cache

use clap::{Args, Subcommand};

use conclave_core::cache::{CacheStore, FileCache};

/// Arguments for the cache command
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Remove every cached review result
    Clear,
}

impl CacheArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        match self.command {
            CacheCommand::Clear => {
                let project_dir = std::env::current_dir()?;
                let cache = FileCache::for_project(&project_dir);
                let removed = cache.clear().await?;
                println!("Removed {} cached review(s).", removed);
            }
        }
        Ok(())
    }
}
