//! Per-job audit trail
//!
//! Every job may capture an append-only sequence of typed entries: the
//! context snapshot, the user prompt, tool calls and their results, the
//! final agent response, and terminal errors. Recorders are looked up
//! through a shared registry keyed by correlation id so collaborator code
//! deep in the call chain can reach the active recorder without threading
//! it through every call.
//!
//! Invariant: a job's registry entry never outlives the job. `register`
//! runs once before the agent invocation and hands back a guard; the
//! entry is removed when the guard drops, on every exit path including
//! task cancellation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::review::{CorrelationId, Severity};
use crate::Result;

/// One typed entry in a job's audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEntry {
    /// Snapshot of the packed context handed to the agent
    ContextSnapshot { chars: usize },

    /// The full user prompt
    UserPrompt { prompt: String },

    /// The agent called a tool
    ToolCall {
        name: String,
        arguments: serde_json::Value,
        call_id: Option<String>,
    },

    /// A tool finished and returned to the agent
    ToolResult {
        name: String,
        content: Option<serde_json::Value>,
        call_id: Option<String>,
        error: Option<String>,
    },

    /// The agent produced its final structured result
    AgentResponse {
        summary: String,
        issues_found: usize,
        severity: Severity,
        duration_ms: u64,
    },

    /// The job ended with an error
    Error { message: String, kind: String },
}

/// An audit entry with its capture time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: AuditEntry,
}

/// Append-only audit trail for one job
pub struct AuditRecorder {
    correlation_id: CorrelationId,
    file: PathBuf,
    entries: Mutex<Vec<RecordedEntry>>,
}

impl AuditRecorder {
    pub fn new(correlation_id: CorrelationId, file: impl Into<PathBuf>) -> Self {
        Self {
            correlation_id,
            file: file.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Append an entry, stamping it with the current time
    pub fn append(&self, entry: AuditEntry) {
        let recorded = RecordedEntry {
            at: Utc::now(),
            entry,
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(recorded);
        }
    }

    /// Snapshot of all entries recorded so far, in order
    pub fn entries(&self) -> Vec<RecordedEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Number of tool-call entries recorded so far
    pub fn tool_call_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| matches!(e.entry, AuditEntry::ToolCall { .. }))
            .count()
    }

    /// Persist the trail as JSON lines under `dir`, one file per job
    pub fn flush_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let safe_name: String = self
            .file
            .display()
            .to_string()
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == ' ' { '_' } else { c })
            .take(80)
            .collect();
        let path = dir.join(format!(
            "audit_{}_{}.jsonl",
            self.correlation_id.short(),
            safe_name
        ));

        let mut body = String::new();
        for entry in self.entries() {
            body.push_str(&serde_json::to_string(&entry)?);
            body.push('\n');
        }
        std::fs::write(&path, body)?;
        Ok(path)
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("correlation_id", &self.correlation_id)
            .field("file", &self.file)
            .field("entries", &self.entries().len())
            .finish()
    }
}

/// Registry of active recorders, keyed by correlation id.
///
/// This is the only state shared across concurrently running jobs; a
/// single lock guards the whole map.
#[derive(Debug, Default)]
pub struct AuditRegistry {
    inner: Mutex<HashMap<CorrelationId, Arc<AuditRecorder>>>,
}

impl AuditRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recorder under its correlation id.
    ///
    /// Returns a guard holding the entry; dropping the guard removes it,
    /// so a cancelled job cannot leave its recorder behind. A collision
    /// means a previous job leaked its entry; the new recorder wins and
    /// the leak is logged.
    pub fn register(self: Arc<Self>, recorder: Arc<AuditRecorder>) -> RecorderRegistration {
        if let Ok(mut map) = self.inner.lock() {
            let id = recorder.correlation_id();
            if map.insert(id, Arc::clone(&recorder)).is_some() {
                tracing::warn!(correlation_id = %id, "audit recorder replaced a stale registry entry");
            }
        }
        RecorderRegistration {
            registry: self,
            recorder,
        }
    }

    /// Look up the active recorder for a correlation id
    pub fn lookup(&self, id: &CorrelationId) -> Option<Arc<AuditRecorder>> {
        self.inner.lock().ok().and_then(|map| map.get(id).cloned())
    }

    /// Remove a job's entry; called exactly once on every job exit path
    pub fn unregister(&self, id: &CorrelationId) -> Option<Arc<AuditRecorder>> {
        self.inner.lock().ok().and_then(|mut map| map.remove(id))
    }

    /// Number of currently registered recorders
    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Guard over one job's registry entry.
///
/// The entry lives exactly as long as the guard, which the job driver
/// keeps across its awaits; when the job finishes, fails, or is aborted
/// mid-await, dropping the guard removes the entry.
pub struct RecorderRegistration {
    registry: Arc<AuditRegistry>,
    recorder: Arc<AuditRecorder>,
}

impl RecorderRegistration {
    pub fn recorder(&self) -> &Arc<AuditRecorder> {
        &self.recorder
    }
}

impl Drop for RecorderRegistration {
    fn drop(&mut self) {
        self.registry.unregister(&self.recorder.correlation_id());
    }
}
