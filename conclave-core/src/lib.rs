//! Conclave Core - Batch code review orchestration
//!
//! This crate drives many independent file-review jobs against a streaming
//! AI review agent: bounded concurrent dispatch, retry with exponential
//! backoff for rate-limited calls, live status reporting, result caching,
//! and a correlation-keyed audit trail per job.

pub mod agent;
pub mod audit;
pub mod cache;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod git;
pub mod retry;
pub mod review;
pub mod router;
pub mod status;

pub use agent::{AgentEvent, ReviewAgent};
pub use audit::{AuditEntry, AuditRecorder, AuditRegistry, RecorderRegistration};
pub use cache::{CacheGateway, CacheKey, CacheStore};
pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{Error, Result};
pub use executor::ReviewExecutor;
pub use review::{CorrelationId, ReviewJob, ReviewPhase};
pub use review::{Issue, IssueCategory, ReviewResult, Severity};
pub use status::StatusSink;
