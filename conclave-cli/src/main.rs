//! Conclave CLI - batch AI code review
//!
//! Reviews many files concurrently against a streaming AI review agent.

mod commands;
mod output;
mod spinner;

use clap::{Parser, Subcommand};
use conclave_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{CacheArgs, ReviewArgs};

/// Conclave: concurrent AI code review for whole batches of files
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the review agent executable (overrides config and env)
    #[arg(long, global = true, env = "CONCLAVE_AGENT_PATH")]
    agent_path: Option<String>,

    /// Model to use (overrides config and env)
    #[arg(long, global = true, env = "CONCLAVE_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Review files
    #[command(visible_alias = "r")]
    Review(ReviewArgs),

    /// Manage the review result cache
    Cache(CacheArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = Config::load_with_overrides(cli.agent_path.clone(), cli.model.clone())?;

    if cli.verbose {
        tracing::info!(
            agent_path = %config.agent.agent_path,
            model = ?config.agent.model,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("conclave {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Review(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Cache(args)) => {
            args.execute().await?;
        }
        Some(Commands::Config) => {
            println!("Conclave Configuration");
            println!("======================");
            println!();
            println!("Agent Settings:");
            println!("  agent_path: {}", config.agent.agent_path);
            println!(
                "  model: {}",
                config.agent.model.as_deref().unwrap_or("(default)")
            );
            println!();
            println!("Review Settings:");
            println!(
                "  max_concurrent_reviews: {}",
                config.review.max_concurrent_reviews
            );
            println!("  enable_cache: {}", config.review.enable_cache);
            println!("  audit: {}", config.review.audit);
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        None => {
            println!("Conclave - concurrent AI code review");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
