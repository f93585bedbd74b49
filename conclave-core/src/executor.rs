//! Per-job review driver
//!
//! Runs one job end to end: extract context, consult the cache, register
//! the audit recorder, invoke the agent under the retry controller with
//! the event router attached, then store the result. The audit registry
//! entry is removed on every exit path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::agent::ReviewAgent;
use crate::audit::{AuditEntry, AuditRegistry, RecorderRegistration};
use crate::cache::{CacheGateway, CacheKey};
use crate::context::ContextExtractor;
use crate::dispatch::JobRunner;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::review::{ReviewJob, ReviewResult};
use crate::router::route_events;
use crate::status::StatusSink;
use crate::Result;

/// Size of the per-attempt event channel between agent and router
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drives single reviews; plugged into the dispatcher as the job runner
pub struct ReviewExecutor {
    agent: Arc<dyn ReviewAgent>,
    extractor: Arc<dyn ContextExtractor>,
    cache: CacheGateway,
    registry: Arc<AuditRegistry>,
    sink: Arc<dyn StatusSink>,
    retry: RetryPolicy,
    model_id: String,
    audit_dir: Option<PathBuf>,
    audit_enabled: bool,
}

impl ReviewExecutor {
    pub fn new(
        agent: Arc<dyn ReviewAgent>,
        extractor: Arc<dyn ContextExtractor>,
        cache: CacheGateway,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            agent,
            extractor,
            cache,
            registry: Arc::new(AuditRegistry::new()),
            sink,
            retry: RetryPolicy::default(),
            model_id: "unknown".to_string(),
            audit_dir: None,
            audit_enabled: false,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Model identity folded into cache keys
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Enable audit capture; trails are flushed under `dir` when given
    pub fn with_audit(mut self, dir: Option<PathBuf>) -> Self {
        self.audit_enabled = true;
        self.audit_dir = dir;
        self
    }

    pub fn registry(&self) -> &Arc<AuditRegistry> {
        &self.registry
    }

    fn start_recorder(&self, job: &ReviewJob) -> Option<RecorderRegistration> {
        if !self.audit_enabled {
            return None;
        }
        let recorder = Arc::new(crate::audit::AuditRecorder::new(
            job.correlation_id,
            &job.path,
        ));
        Some(Arc::clone(&self.registry).register(recorder))
    }

    fn finish_recorder(
        &self,
        registration: Option<RecorderRegistration>,
        job: &ReviewJob,
        outcome: &Result<ReviewResult>,
        started: Instant,
    ) {
        let Some(registration) = registration else {
            return;
        };
        let recorder = Arc::clone(registration.recorder());

        match outcome {
            Ok(result) => recorder.append(AuditEntry::AgentResponse {
                summary: result.summary.clone(),
                issues_found: result.issues.len(),
                severity: result.severity,
                duration_ms: started.elapsed().as_millis() as u64,
            }),
            Err(e) => recorder.append(AuditEntry::Error {
                message: e.to_string(),
                kind: e.kind().to_string(),
            }),
        }

        // removes the registry entry
        drop(registration);

        if let Some(ref dir) = self.audit_dir {
            if let Err(e) = recorder.flush_to(dir) {
                tracing::warn!(file = %job.display_path(), error = %e, "failed to write audit trail");
            }
        }
    }
}

#[async_trait]
impl JobRunner for ReviewExecutor {
    async fn run(&self, job: ReviewJob) -> Result<ReviewResult> {
        let context = self
            .extractor
            .extract(&job.path, job.diff_base.as_deref())
            .await?;

        let key = CacheKey::for_job(&job, &context, &self.model_id);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(file = %job.display_path(), "cache hit");
            self.sink
                .progress(&format!("Using cached review for {}", job.display_path()));
            return Ok(hit);
        }

        let registration = self.start_recorder(&job);
        let recorder = registration.as_ref().map(|r| Arc::clone(r.recorder()));
        let prompt = job.to_prompt(&context);
        if let Some(ref rec) = recorder {
            rec.append(AuditEntry::ContextSnapshot {
                chars: context.chars().count(),
            });
            rec.append(AuditEntry::UserPrompt {
                prompt: prompt.clone(),
            });
        }

        let started = Instant::now();
        let outcome = run_with_retry(&self.retry, &self.sink, |ticker| {
            let agent = Arc::clone(&self.agent);
            let prompt = prompt.clone();
            let recorder = recorder.clone();
            async move {
                let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
                let router = route_events(rx, ticker, recorder);
                let (result, ()) = tokio::join!(agent.invoke(&prompt, events), router);
                result
            }
        })
        .await;

        self.finish_recorder(registration, &job, &outcome, started);

        let result = outcome?;
        self.cache.put(&key, &result).await;
        Ok(result)
    }
}
