//! Subprocess-backed review agent
//!
//! Spawns an external review agent executable in stream-json mode and
//! translates its line-delimited output into `AgentEvent`s. The final
//! `result` line carries the structured review.

use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::config::AgentSettings;
use crate::review::ReviewResult;
use crate::{Error, Result};

use super::{AgentEvent, ReviewAgent};

/// A message on the agent's stream-json output
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamMessage {
    /// A new output part began; tool parts carry the tool name
    PartStart {
        #[serde(default)]
        tool_name: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        arguments: Option<String>,
    },

    /// Incremental review text
    TextDelta {
        #[serde(default)]
        text: String,
    },

    /// A tool call was dispatched
    ToolCall { call_id: String, tool_name: String },

    /// A tool finished
    ToolResult {
        call_id: String,
        #[serde(default)]
        content: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    },

    /// Final structured review
    Result { review: ReviewResult },
}

/// Review agent that shells out to a configurable executable
#[derive(Debug, Clone)]
pub struct CommandAgent {
    agent_path: String,
    model: Option<String>,
    api_key_env: String,
}

impl CommandAgent {
    pub fn new(settings: &AgentSettings) -> Self {
        Self {
            agent_path: settings.agent_path.clone(),
            model: settings.model.clone(),
            api_key_env: settings.api_key_env.clone(),
        }
    }

    /// Build the command to spawn the agent
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.agent_path);
        cmd.arg("--output-format").arg("stream-json");

        if let Some(ref model) = self.model {
            cmd.arg("--model").arg(model);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd
    }

    /// Missing credentials abort the whole batch, so they are surfaced as
    /// a configuration error rather than an agent failure.
    fn check_credentials(&self) -> Result<()> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(Error::Config(format!(
                "No API keys configured. Set the {} environment variable.",
                self.api_key_env
            ))),
        }
    }

    fn dispatch(msg: StreamMessage, events: &mpsc::Sender<AgentEvent>) -> Option<ReviewResult> {
        let event = match msg {
            StreamMessage::PartStart {
                tool_name,
                call_id,
                arguments,
            } => AgentEvent::PartStart {
                tool_name,
                call_id,
                arguments,
            },
            StreamMessage::TextDelta { text } => AgentEvent::TextDelta { text },
            StreamMessage::ToolCall { call_id, tool_name } => {
                AgentEvent::ToolCall { call_id, tool_name }
            }
            StreamMessage::ToolResult {
                call_id,
                content,
                error,
            } => AgentEvent::ToolResult {
                call_id,
                content,
                error,
            },
            StreamMessage::Result { review } => {
                let _ = events.try_send(AgentEvent::FinalResult);
                return Some(review);
            }
        };

        // The router may have already terminated; losing a status event is
        // harmless.
        let _ = events.try_send(event);
        None
    }
}

#[async_trait::async_trait]
impl ReviewAgent for CommandAgent {
    async fn invoke(
        &self,
        prompt: &str,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<ReviewResult> {
        self.check_credentials()?;

        let mut cmd = self.build_command();
        cmd.arg(prompt);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Agent(format!(
                    "Review agent executable not found at '{}'",
                    self.agent_path
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Agent("Failed to capture agent stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Agent("Failed to capture agent stderr".to_string()))?;

        // Drained concurrently; an agent filling the stderr pipe while we
        // only read stdout would otherwise stall both processes.
        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut review: Option<ReviewResult> = None;

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await.map_err(Error::Io)?;
            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<StreamMessage>(trimmed) {
                Ok(msg) => {
                    if let Some(result) = Self::dispatch(msg, &events) {
                        review = Some(result);
                    }
                }
                Err(e) => {
                    tracing::debug!(line = trimmed, error = %e, "skipping malformed stream line");
                }
            }
        }

        let status = child.wait().await.map_err(Error::Io)?;

        if !status.success() {
            let stderr_text = stderr_task.await.unwrap_or_default();
            let message = if stderr_text.trim().is_empty() {
                format!("Agent exited with code {}", status.code().unwrap_or(-1))
            } else {
                stderr_text.trim().to_string()
            };

            let err = Error::Agent(message.clone());
            return if err.is_transient() {
                Err(Error::RateLimit(message))
            } else {
                Err(err)
            };
        }

        review.ok_or_else(|| Error::Agent("Agent stream ended without a result".to_string()))
    }
}
