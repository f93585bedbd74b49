//! Review jobs and structured review results

mod job;
mod result;

pub use job::{sanitize_extra_instructions, CorrelationId, ReviewJob, ReviewPhase};
pub use result::{
    CrossFileIssue, DependencyAnalysis, Issue, IssueCategory, ReviewResult, Severity,
};
