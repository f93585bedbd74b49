//! Streaming event router
//!
//! Consumes one job's live event sequence and, for each event, derives a
//! deduplicated status message and appends audit entries. State is scoped
//! to one job: the last status shown and a call-id to tool-name map used
//! to correlate tool results back to their originating calls.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::AgentEvent;
use crate::audit::{AuditEntry, AuditRecorder};
use crate::status::TickerHandle;

/// Fallback tool name when a result arrives for an unknown call id
const UNKNOWN_TOOL: &str = "unknown_tool";

/// Per-job router state, constructed fresh for every job
#[derive(Debug, Default)]
pub struct RouterState {
    last_status: Option<String>,
    tool_calls: HashMap<String, String>,
}

impl RouterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle one event: emit a deduplicated status and append audit
    /// entries as appropriate.
    pub fn handle(
        &mut self,
        event: AgentEvent,
        ticker: &TickerHandle,
        recorder: Option<&AuditRecorder>,
    ) {
        match event {
            AgentEvent::PartStart {
                tool_name: Some(name),
                call_id,
                arguments,
            } => {
                self.emit_status(ticker, format!("Calling tool: {}...", name));
                if let Some(rec) = recorder {
                    rec.append(AuditEntry::ToolCall {
                        name,
                        arguments: parse_arguments(arguments),
                        call_id,
                    });
                }
            }
            AgentEvent::PartStart {
                tool_name: None, ..
            } => {
                self.emit_status(ticker, "Generating review...".to_string());
            }
            AgentEvent::TextDelta { .. } => {
                // The ticker repaints its own message while active; only
                // announce text generation when nothing else is showing.
                if !ticker.is_active() {
                    self.emit_status(ticker, "Writing review...".to_string());
                }
            }
            AgentEvent::ToolCall { call_id, tool_name } => {
                self.emit_status(ticker, format!("Executing: {}...", tool_name));
                self.tool_calls.insert(call_id, tool_name);
            }
            AgentEvent::ToolResult {
                call_id,
                content,
                error,
            } => {
                if let Some(rec) = recorder {
                    let name = self
                        .tool_calls
                        .get(&call_id)
                        .cloned()
                        .unwrap_or_else(|| UNKNOWN_TOOL.to_string());
                    rec.append(AuditEntry::ToolResult {
                        name,
                        content,
                        call_id: Some(call_id),
                        error,
                    });
                }
            }
            AgentEvent::FinalResult => {
                self.emit_status(ticker, "Finalizing review...".to_string());
            }
        }
    }

    /// Show a status only when it differs from the previous one
    fn emit_status(&mut self, ticker: &TickerHandle, status: String) {
        if self.last_status.as_deref() != Some(status.as_str()) {
            ticker.show(&status);
            self.last_status = Some(status);
        }
    }

    /// The most recently shown status, if any
    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }
}

/// Argument payloads arrive as raw text; structured data is preferred for
/// the audit trail, with the raw string kept as a fallback.
fn parse_arguments(raw: Option<String>) -> serde_json::Value {
    match raw {
        None => serde_json::Value::Object(serde_json::Map::new()),
        Some(text) => {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        }
    }
}

/// Drain a job's event sequence until it ends.
///
/// Terminates when the sender side is dropped, whether the agent call
/// finished normally or failed. Holds no state useful across jobs.
pub async fn route_events(
    mut events: mpsc::Receiver<AgentEvent>,
    ticker: TickerHandle,
    recorder: Option<Arc<AuditRecorder>>,
) {
    let mut state = RouterState::new();
    while let Some(event) = events.recv().await {
        state.handle(event, &ticker, recorder.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::CorrelationId;
    use crate::status::test_support::RecordingSink;
    use crate::status::StatusSink;

    fn ticker(sink: &Arc<RecordingSink>) -> TickerHandle {
        TickerHandle::detached(Arc::clone(sink) as Arc<dyn StatusSink>)
    }

    #[test]
    fn test_tool_part_start_status_and_audit() {
        let sink = Arc::new(RecordingSink::default());
        let handle = ticker(&sink);
        let rec = AuditRecorder::new(CorrelationId::new(), "f.rs");
        let mut state = RouterState::new();

        state.handle(
            AgentEvent::PartStart {
                tool_name: Some("read_file".to_string()),
                call_id: Some("c1".to_string()),
                arguments: Some(r#"{"path":"f.rs"}"#.to_string()),
            },
            &handle,
            Some(&rec),
        );

        assert_eq!(sink.phases(), vec!["Calling tool: read_file...".to_string()]);
        let entries = rec.entries();
        assert_eq!(entries.len(), 1);
        match &entries[0].entry {
            AuditEntry::ToolCall {
                name, arguments, ..
            } => {
                assert_eq!(name, "read_file");
                assert_eq!(arguments["path"], "f.rs");
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_arguments_kept_as_text() {
        let rec = AuditRecorder::new(CorrelationId::new(), "f.rs");
        let sink = Arc::new(RecordingSink::default());
        let mut state = RouterState::new();

        state.handle(
            AgentEvent::PartStart {
                tool_name: Some("grep".to_string()),
                call_id: None,
                arguments: Some("not json {".to_string()),
            },
            &ticker(&sink),
            Some(&rec),
        );

        match &rec.entries()[0].entry {
            AuditEntry::ToolCall { arguments, .. } => {
                assert_eq!(arguments, &serde_json::json!("not json {"));
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn test_statuses_are_deduplicated() {
        let sink = Arc::new(RecordingSink::default());
        let handle = ticker(&sink);
        let mut state = RouterState::new();

        for _ in 0..3 {
            state.handle(
                AgentEvent::PartStart {
                    tool_name: None,
                    call_id: None,
                    arguments: None,
                },
                &handle,
                None,
            );
        }
        state.handle(AgentEvent::FinalResult, &handle, None);

        assert_eq!(
            sink.phases(),
            vec![
                "Generating review...".to_string(),
                "Finalizing review...".to_string()
            ]
        );
    }

    #[test]
    fn test_tool_result_resolves_name_via_call_map() {
        let rec = AuditRecorder::new(CorrelationId::new(), "f.rs");
        let sink = Arc::new(RecordingSink::default());
        let handle = ticker(&sink);
        let mut state = RouterState::new();

        state.handle(
            AgentEvent::ToolCall {
                call_id: "c7".to_string(),
                tool_name: "search".to_string(),
            },
            &handle,
            Some(&rec),
        );
        state.handle(
            AgentEvent::ToolResult {
                call_id: "c7".to_string(),
                content: Some(serde_json::json!(["hit"])),
                error: None,
            },
            &handle,
            Some(&rec),
        );

        assert_eq!(sink.phases(), vec!["Executing: search...".to_string()]);
        match &rec.entries()[0].entry {
            AuditEntry::ToolResult { name, .. } => assert_eq!(name, "search"),
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn test_tool_result_unknown_call_id_falls_back() {
        let rec = AuditRecorder::new(CorrelationId::new(), "f.rs");
        let sink = Arc::new(RecordingSink::default());
        let mut state = RouterState::new();

        state.handle(
            AgentEvent::ToolResult {
                call_id: "never-seen".to_string(),
                content: None,
                error: Some("timed out".to_string()),
            },
            &ticker(&sink),
            Some(&rec),
        );

        match &rec.entries()[0].entry {
            AuditEntry::ToolResult { name, error, .. } => {
                assert_eq!(name, "unknown_tool");
                assert_eq!(error.as_deref(), Some("timed out"));
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn test_text_delta_status_only_when_ticker_inactive() {
        let sink = Arc::new(RecordingSink::default());
        let handle = ticker(&sink); // detached handles are inactive
        let mut state = RouterState::new();

        state.handle(
            AgentEvent::TextDelta {
                text: "chunk".to_string(),
            },
            &handle,
            None,
        );
        assert_eq!(sink.phases(), vec!["Writing review...".to_string()]);
        assert_eq!(state.last_status(), Some("Writing review..."));
    }

    #[tokio::test]
    async fn test_route_events_terminates_on_sender_drop() {
        let sink = Arc::new(RecordingSink::default());
        let handle = ticker(&sink);
        let (tx, rx) = mpsc::channel(8);

        let router = tokio::spawn(route_events(rx, handle, None));
        tx.send(AgentEvent::FinalResult).await.unwrap();
        drop(tx);

        router.await.unwrap();
        assert_eq!(sink.phases(), vec!["Finalizing review...".to_string()]);
    }
}
