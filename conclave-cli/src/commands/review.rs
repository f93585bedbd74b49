//! Review command - run a batch of file reviews

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Args;

use conclave_core::agent::CommandAgent;
use conclave_core::cache::FileCache;
use conclave_core::context::FileContextExtractor;
use conclave_core::dispatch::JobRunner;
use conclave_core::git::GitRepo;
use conclave_core::retry::RetryPolicy;
use conclave_core::{
    CacheGateway, Config, Dispatcher, ReviewExecutor, ReviewJob, ReviewPhase, StatusSink,
};

use crate::output::{render, OutputFormat};
use crate::spinner::SpinnerSink;

/// Arguments for the review command
#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Files to review
    pub files: Vec<PathBuf>,

    /// Review every file with uncommitted changes instead of listing files
    #[arg(long, conflicts_with = "files")]
    pub uncommitted: bool,

    /// Review changes against this git reference (e.g. "main")
    #[arg(long, value_name = "REF")]
    pub diff: Option<String>,

    /// Comma-separated review phases (security, performance,
    /// maintainability, best_practices); default is all
    #[arg(long)]
    pub phases: Option<String>,

    /// Extra instructions appended to every review prompt
    #[arg(long)]
    pub instructions: Option<String>,

    /// Skip the review result cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Capture per-job audit trails under .conclave/audit
    #[arg(long)]
    pub audit: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

impl ReviewArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let files = self.collect_files()?;
        if files.is_empty() {
            bail!("No files to review. Pass file paths or use --uncommitted.");
        }

        let phases = self
            .phases
            .as_deref()
            .map(ReviewPhase::parse_list)
            .unwrap_or_default();

        let jobs: Vec<ReviewJob> = files
            .into_iter()
            .map(|path| {
                let mut job = ReviewJob::new(path).with_phases(phases.clone());
                if let Some(ref instructions) = self.instructions {
                    job = job.with_extra_instructions(instructions.clone());
                }
                if let Some(ref base) = self.diff {
                    job = job.with_diff_base(base.clone());
                }
                job
            })
            .collect();

        let sink: Arc<dyn StatusSink> = Arc::new(SpinnerSink::new());

        let cache = if self.no_cache || !config.review.enable_cache {
            CacheGateway::disabled()
        } else {
            let project_dir = std::env::current_dir().context("cannot resolve working directory")?;
            CacheGateway::new(Arc::new(FileCache::for_project(&project_dir)), true)
        };

        let mut executor = ReviewExecutor::new(
            Arc::new(CommandAgent::new(&config.agent)),
            Arc::new(FileContextExtractor::new()),
            cache,
            Arc::clone(&sink),
        )
        .with_retry_policy(RetryPolicy::new(3, config.review.retry_base_delay))
        .with_model_id(config.model_id());

        if self.audit || config.review.audit {
            executor = executor.with_audit(Some(PathBuf::from(".conclave/audit")));
        }

        let dispatcher = Dispatcher::new(
            Arc::new(executor) as Arc<dyn JobRunner>,
            sink,
            config.review.max_concurrent_reviews,
        );

        let completed = dispatcher.dispatch(jobs).await?;
        print!("{}", render(&completed, self.format)?);
        Ok(())
    }

    fn collect_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        if !self.uncommitted {
            return Ok(self.files.clone());
        }

        let repo = GitRepo::open(".")?;
        let files = repo
            .uncommitted_files()?
            .into_iter()
            .map(|relative| repo.root().join(relative))
            .collect();
        Ok(files)
    }
}
