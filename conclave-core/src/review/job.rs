//! Review job definition
//!
//! A `ReviewJob` is one unit of work reviewing a single file. It is created
//! once per file at batch start, immutable afterwards, and carries a fresh
//! correlation id tying its prompt, tool activity, and result together in
//! the audit trail.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Maximum accepted length for extra review instructions
const MAX_EXTRA_INSTRUCTIONS_LEN: usize = 10_000;

/// Opaque token tying one job's audit activity together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in file names and progress lines
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A focus area for the review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPhase {
    Security,
    Performance,
    Maintainability,
    BestPractices,
}

impl ReviewPhase {
    /// All phases, in the order they are presented to the agent
    pub const ALL: [ReviewPhase; 4] = [
        ReviewPhase::Security,
        ReviewPhase::Performance,
        ReviewPhase::Maintainability,
        ReviewPhase::BestPractices,
    ];

    /// Stable name used on the CLI and in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewPhase::Security => "security",
            ReviewPhase::Performance => "performance",
            ReviewPhase::Maintainability => "maintainability",
            ReviewPhase::BestPractices => "best_practices",
        }
    }

    /// Parse a comma-separated phase list, silently dropping unknown names.
    ///
    /// Returns an empty vector (meaning "all phases") when nothing valid
    /// remains.
    pub fn parse_list(list: &str) -> Vec<ReviewPhase> {
        list.split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect()
    }
}

impl FromStr for ReviewPhase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "security" => Ok(ReviewPhase::Security),
            "performance" => Ok(ReviewPhase::Performance),
            "maintainability" => Ok(ReviewPhase::Maintainability),
            "best_practices" => Ok(ReviewPhase::BestPractices),
            other => Err(Error::Config(format!("Unknown review phase: {}", other))),
        }
    }
}

impl fmt::Display for ReviewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of work reviewing a single file
#[derive(Debug, Clone)]
pub struct ReviewJob {
    /// File being reviewed
    pub path: PathBuf,
    /// Phases to focus on; empty means all phases in a single pass
    pub phases: Vec<ReviewPhase>,
    /// Free-text instructions appended to the prompt
    pub extra_instructions: Option<String>,
    /// Git reference to diff against; when set, only changed code is reviewed
    pub diff_base: Option<String>,
    /// Correlation id for audit capture
    pub correlation_id: CorrelationId,
}

impl ReviewJob {
    /// Create a job for a file with a fresh correlation id
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            phases: Vec::new(),
            extra_instructions: None,
            diff_base: None,
            correlation_id: CorrelationId::new(),
        }
    }

    /// Restrict the review to specific phases
    pub fn with_phases(mut self, phases: Vec<ReviewPhase>) -> Self {
        self.phases = phases;
        self
    }

    /// Attach sanitized extra instructions
    pub fn with_extra_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.extra_instructions = Some(sanitize_extra_instructions(&instructions.into()));
        self
    }

    /// Review against a git base reference
    pub fn with_diff_base(mut self, base_ref: impl Into<String>) -> Self {
        self.diff_base = Some(base_ref.into());
        self
    }

    /// Build the user prompt sent to the review agent
    pub fn to_prompt(&self, packed_context: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str("Please review the following code:\n\n");
        prompt.push_str(packed_context);
        prompt.push('\n');

        if !self.phases.is_empty() {
            let names: Vec<&str> = self.phases.iter().map(ReviewPhase::as_str).collect();
            prompt.push_str(&format!("\nFocus the review on: {}\n", names.join(", ")));
        }

        if let Some(ref instructions) = self.extra_instructions {
            prompt.push_str(&format!("\nAdditional instructions:\n{}\n", instructions));
        }

        prompt
    }

    /// Display-friendly identity for logs and progress lines
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

impl AsRef<Path> for ReviewJob {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Cap length and strip control characters from user-supplied instructions
pub fn sanitize_extra_instructions(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.len() > MAX_EXTRA_INSTRUCTIONS_LEN {
        let mut end = MAX_EXTRA_INSTRUCTIONS_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        trimmed[..end].to_string()
    } else {
        trimmed.to_string()
    }
}
