//! Review agent abstraction
//!
//! The agent is an external collaborator: it accepts a prompt, works
//! through its tools, and produces a structured `ReviewResult`. While it
//! runs it emits a live, finite, non-restartable event sequence which the
//! event router consumes for status display and audit capture.

mod command;

pub use command::CommandAgent;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::review::ReviewResult;
use crate::Result;

/// One event in a job's live event sequence
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The agent started producing a new output part. Tool parts carry the
    /// tool name; plain text parts do not.
    PartStart {
        tool_name: Option<String>,
        call_id: Option<String>,
        /// Raw argument payload; parsed as JSON by the router when possible
        arguments: Option<String>,
    },

    /// A chunk of review text was generated
    TextDelta { text: String },

    /// A tool call was dispatched for execution
    ToolCall { call_id: String, tool_name: String },

    /// A tool finished executing
    ToolResult {
        call_id: String,
        content: Option<serde_json::Value>,
        error: Option<String>,
    },

    /// The agent committed to its final structured result
    FinalResult,
}

/// Trait for streaming review agents
#[async_trait]
pub trait ReviewAgent: Send + Sync {
    /// Run one review to completion.
    ///
    /// Events are pushed on `events` as the agent works; the sender is
    /// dropped when the sequence ends, which terminates the router. May
    /// fail with `Error::Config` when provider credentials are missing
    /// (fatal to the batch) or `Error::RateLimit` on throttling.
    async fn invoke(
        &self,
        prompt: &str,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<ReviewResult>;
}
