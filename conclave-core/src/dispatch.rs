//! Concurrency-bounded batch dispatch
//!
//! Fans a batch of review jobs out over a bounded number of concurrent
//! slots and assembles the successful results back in input order. A
//! failed job is logged and dropped from the output; a configuration
//! failure (missing provider credentials) aborts the whole batch.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::review::{ReviewJob, ReviewResult};
use crate::status::StatusSink;
use crate::Result;

/// Number of jobs that may run at once.
///
/// Small batches run fully parallel; larger ones are limited to half the
/// batch, clamped between 3 and the configured maximum.
pub fn concurrency_limit(batch_size: usize, configured_max: usize) -> usize {
    if batch_size <= 5 {
        batch_size
    } else {
        (batch_size / 2).min(configured_max).max(3)
    }
}

/// Runs one review job to completion
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, job: ReviewJob) -> Result<ReviewResult>;
}

/// A job together with its successful result
#[derive(Debug, Clone)]
pub struct CompletedReview {
    pub job: ReviewJob,
    pub result: ReviewResult,
}

/// Batch dispatcher over a job runner
pub struct Dispatcher {
    runner: Arc<dyn JobRunner>,
    sink: Arc<dyn StatusSink>,
    configured_max: usize,
}

impl Dispatcher {
    pub fn new(runner: Arc<dyn JobRunner>, sink: Arc<dyn StatusSink>, configured_max: usize) -> Self {
        Self {
            runner,
            sink,
            configured_max,
        }
    }

    /// Run the batch.
    ///
    /// The output preserves input order and contains only the jobs that
    /// succeeded. Per-job failures are reported on the status sink and
    /// logged; a fatal error aborts every remaining job and is returned.
    pub async fn dispatch(&self, jobs: Vec<ReviewJob>) -> Result<Vec<CompletedReview>> {
        let total = jobs.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let limit = concurrency_limit(total, self.configured_max);
        tracing::info!(jobs = total, limit, "dispatching review batch");

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut set: JoinSet<(usize, Result<CompletedReview>)> = JoinSet::new();

        for (idx, job) in jobs.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let runner = Arc::clone(&self.runner);
            let sink = Arc::clone(&self.sink);

            set.spawn(async move {
                let path = job.display_path();
                let outcome: Result<CompletedReview> = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| crate::Error::Agent("Dispatcher shut down".to_string()))?;
                    sink.progress(&format!("[{}/{}] Reviewing: {}", idx + 1, total, path));
                    let result = runner.run(job.clone()).await?;
                    Ok(CompletedReview { job, result })
                }
                .await;

                match &outcome {
                    Ok(_) => {
                        sink.progress(&format!("[{}/{}] Completed: {}", idx + 1, total, path));
                    }
                    Err(e) => {
                        tracing::warn!(file = %path, kind = e.kind(), error = %e, "review failed");
                        sink.progress(&format!(
                            "[{}/{}] Failed: {} ({})",
                            idx + 1,
                            total,
                            path,
                            e.kind()
                        ));
                    }
                }
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<CompletedReview>> = Vec::new();
        slots.resize_with(total, || None);

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(completed))) => {
                    slots[idx] = Some(completed);
                }
                Ok((_, Err(e))) if e.is_fatal() => {
                    tracing::error!(error = %e, "fatal error, aborting batch");
                    set.abort_all();
                    while set.join_next().await.is_some() {}
                    return Err(e);
                }
                Ok((_, Err(_))) => {
                    // already reported in the task; job is dropped
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    tracing::error!(error = %join_err, "review task panicked");
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::test_support::RecordingSink;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Runner driven by the file name: "fail-*" errors, "fatal-*" raises a
    /// configuration error, everything else succeeds after a short pause.
    struct PathDrivenRunner {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PathDrivenRunner {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl JobRunner for PathDrivenRunner {
        async fn run(&self, job: ReviewJob) -> Result<ReviewResult> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let name = job.display_path();
            if name.starts_with("fatal-") {
                Err(Error::Config("No API keys configured".to_string()))
            } else if name.starts_with("fail-") {
                Err(Error::Agent("agent blew up".to_string()))
            } else {
                Ok(ReviewResult::clean(format!("reviewed {}", name)))
            }
        }
    }

    fn sink() -> Arc<dyn StatusSink> {
        Arc::new(RecordingSink::default())
    }

    #[test]
    fn test_concurrency_limit_formula() {
        assert_eq!(concurrency_limit(1, 8), 1);
        assert_eq!(concurrency_limit(5, 8), 5);
        assert_eq!(concurrency_limit(6, 8), 3);
        assert_eq!(concurrency_limit(10, 8), 5);
        assert_eq!(concurrency_limit(100, 8), 8);
        assert_eq!(concurrency_limit(8, 2), 3);
        assert_eq!(concurrency_limit(12, 4), 4);
    }

    #[tokio::test]
    async fn test_empty_batch_yields_empty_output() {
        let dispatcher = Dispatcher::new(Arc::new(PathDrivenRunner::new()), sink(), 8);
        assert!(dispatcher.dispatch(Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_output_preserves_order_and_drops_failures() {
        let dispatcher = Dispatcher::new(Arc::new(PathDrivenRunner::new()), sink(), 8);
        let jobs = vec![
            ReviewJob::new("a.rs"),
            ReviewJob::new("fail-b.rs"),
            ReviewJob::new("c.rs"),
            ReviewJob::new("fail-d.rs"),
            ReviewJob::new("e.rs"),
        ];

        let completed = dispatcher.dispatch(jobs).await.unwrap();
        let paths: Vec<String> = completed.iter().map(|c| c.job.display_path()).collect();
        assert_eq!(paths, vec!["a.rs", "c.rs", "e.rs"]);
    }

    #[tokio::test]
    async fn test_in_flight_jobs_never_exceed_limit() {
        let runner = Arc::new(PathDrivenRunner::new());
        let dispatcher = Dispatcher::new(Arc::clone(&runner) as Arc<dyn JobRunner>, sink(), 8);

        let jobs: Vec<ReviewJob> = (0..10)
            .map(|i| ReviewJob::new(format!("file-{}.rs", i)))
            .collect();
        let completed = dispatcher.dispatch(jobs).await.unwrap();

        assert_eq!(completed.len(), 10);
        // limit for 10 jobs with configured max 8 is 5
        assert!(runner.peak.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_batch() {
        let dispatcher = Dispatcher::new(Arc::new(PathDrivenRunner::new()), sink(), 8);
        let jobs = vec![
            ReviewJob::new("fatal-a.rs"),
            ReviewJob::new("b.rs"),
            ReviewJob::new("c.rs"),
        ];

        let err = dispatcher.dispatch(jobs).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_progress_lines_mention_every_job() {
        let recording = Arc::new(RecordingSink::default());
        let dispatcher = Dispatcher::new(
            Arc::new(PathDrivenRunner::new()),
            Arc::clone(&recording) as Arc<dyn StatusSink>,
            8,
        );

        dispatcher
            .dispatch(vec![ReviewJob::new("a.rs"), ReviewJob::new("fail-b.rs")])
            .await
            .unwrap();

        let lines = recording.progress();
        assert!(lines.iter().any(|l| l.contains("Reviewing: a.rs")));
        assert!(lines.iter().any(|l| l.contains("Completed: a.rs")));
        assert!(lines.iter().any(|l| l.contains("Failed: fail-b.rs (agent)")));
    }
}
