//! Structured output produced by a review
//!
//! Mirrors the schema the agent is instructed to emit. Results are
//! immutable once produced and round-trip through serde for caching.

use serde::{Deserialize, Serialize};

/// Severity of an issue or of a whole review
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Security,
    Performance,
    Maintainability,
    Bug,
    Style,
    Documentation,
}

impl Default for IssueCategory {
    fn default() -> Self {
        IssueCategory::Bug
    }
}

/// A single issue found during review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// What is wrong
    pub description: String,
    /// How bad it is
    pub severity: Severity,
    #[serde(default)]
    pub category: IssueCategory,
    /// Line where the issue occurs, when the agent could pin one down
    #[serde(default)]
    pub line_number: Option<u32>,
    /// Exact snippet showing the issue
    #[serde(default)]
    pub code_snippet: Option<String>,
    /// Other files affected by or related to this issue
    #[serde(default)]
    pub related_files: Vec<String>,
    /// Priority from 1 (lowest) to 10 (highest)
    #[serde(default)]
    pub suggested_priority: Option<u8>,
    /// Documentation links, CVE numbers, and similar references
    #[serde(default)]
    pub references: Vec<String>,
    /// Whether the issue can be fixed mechanically
    #[serde(default)]
    pub auto_fixable: bool,
}

/// An issue spanning multiple files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossFileIssue {
    pub description: String,
    pub severity: Severity,
    /// Files involved in this issue
    pub files: Vec<String>,
    #[serde(default)]
    pub category: IssueCategory,
}

/// Dependency findings for the reviewed target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyAnalysis {
    #[serde(default)]
    pub external_dependencies: Vec<String>,
    #[serde(default)]
    pub internal_dependencies: Vec<String>,
    #[serde(default)]
    pub circular_dependencies: Vec<Vec<String>>,
    #[serde(default)]
    pub unused_imports: Vec<String>,
}

/// Structured output from one code review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    /// Overall summary of the review
    pub summary: String,
    /// Issues found, ordered as reported by the agent
    #[serde(default)]
    pub issues: Vec<Issue>,
    /// Overall severity, based on the worst issue found
    pub severity: Severity,
    /// Suggested fix, when the agent produced one
    #[serde(default)]
    pub code_fix: Option<String>,
    /// Issues spanning multiple files
    #[serde(default)]
    pub cross_file_issues: Vec<CrossFileIssue>,
    /// Optional dependency analysis
    #[serde(default)]
    pub dependency_analysis: Option<DependencyAnalysis>,
}

impl ReviewResult {
    /// Minimal result used when an agent reports nothing noteworthy
    pub fn clean(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            issues: Vec::new(),
            severity: Severity::Low,
            code_fix: None,
            cross_file_issues: Vec::new(),
            dependency_analysis: None,
        }
    }
}
