//! Normalized event types for streaming agent turns.
//!
//! The Chat Completions driver and the orchestrator both emit
//! [`NormalizedEvent`]s, so the presentation layer sees one event model
//! regardless of how many tool round-trips a turn takes.
//!
//! # Example
//!
//! ```rust
//! use mcp_agent_chat::normalized::{NormalizedEvent, event_name};
//!
//! let event = NormalizedEvent::MessageDelta {
//!     text: "Hello".to_string(),
//! };
//! assert_eq!(event_name(&event), "message.delta");
//! ```

use serde::{Deserialize, Serialize};

/// Normalized streaming events emitted by the LLM orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum NormalizedEvent {
    // ─────────────────────────────────────────────────────────────────────
    // Stream Lifecycle
    // ─────────────────────────────────────────────────────────────────────
    /// Indicates the start of a new streaming response.
    #[serde(rename = "stream.start")]
    StreamStart {
        /// Unique identifier for this request/response pair.
        request_id: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Message Content
    // ─────────────────────────────────────────────────────────────────────
    /// Incremental text delta from the assistant's response.
    #[serde(rename = "message.delta")]
    MessageDelta {
        /// The text fragment to append.
        text: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Tool Calls
    // ─────────────────────────────────────────────────────────────────────
    /// Incremental tool call data as the model streams it.
    #[serde(rename = "tool_call.delta")]
    ToolCallDelta {
        /// Index of the call within the assistant message.
        call_index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments_delta: Option<String>,
    },

    /// A fully assembled tool call.
    #[serde(rename = "tool_call.complete")]
    ToolCallComplete {
        call_index: usize,
        id: String,
        name: String,
        /// Complete JSON arguments string.
        arguments_json: String,
    },

    /// Result of executing a tool call on an MCP server.
    #[serde(rename = "tool_result")]
    ToolResult {
        /// Tool call ID this result answers.
        id: String,
        name: String,
        content: String,
        #[serde(default = "default_true")]
        success: bool,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Errors and Completion
    // ─────────────────────────────────────────────────────────────────────
    /// An error ended the turn.
    #[serde(rename = "error")]
    Error {
        message: String,
        /// Machine-readable code, e.g. `MAX_TURNS`.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// The turn is complete.
    #[serde(rename = "done")]
    Done,
}

fn default_true() -> bool {
    true
}

/// SSE event name for an event; matches its serialized `type` tag.
pub fn event_name(evt: &NormalizedEvent) -> &'static str {
    match evt {
        NormalizedEvent::StreamStart { .. } => "stream.start",
        NormalizedEvent::MessageDelta { .. } => "message.delta",
        NormalizedEvent::ToolCallDelta { .. } => "tool_call.delta",
        NormalizedEvent::ToolCallComplete { .. } => "tool_call.complete",
        NormalizedEvent::ToolResult { .. } => "tool_result",
        NormalizedEvent::Error { .. } => "error",
        NormalizedEvent::Done => "done",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_delta_serialization() {
        let event = NormalizedEvent::MessageDelta {
            text: "Hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("message.delta"));
        assert!(json.contains("Hello"));
    }

    #[test]
    fn test_event_name_matches_type_tag() {
        let event = NormalizedEvent::Error {
            message: "boom".to_string(),
            code: Some("MAX_TURNS".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event_name(&event));
        assert_eq!(event_name(&NormalizedEvent::Done), "done");
    }

    #[test]
    fn test_tool_result_defaults_to_success() {
        let event: NormalizedEvent = serde_json::from_str(
            r#"{"type":"tool_result","data":{"id":"c1","name":"get_date","content":"2025"}}"#,
        )
        .unwrap();
        assert!(matches!(event, NormalizedEvent::ToolResult { success: true, .. }));
    }
}
