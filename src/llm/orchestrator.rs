//! LLM orchestrator with tool loop execution.
//!
//! The orchestrator manages the complete lifecycle of one agent turn:
//! 1. Collect the tool catalog from the MCP registry
//! 2. Send the instructions and history to the model
//! 3. Stream the response, detecting tool calls
//! 4. Execute tool calls via MCP and feed the results back
//! 5. Repeat until the model answers or the turn limit is reached
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_agent_chat::llm::{Message, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(driver, registry, "You are helpful.", 30);
//! let stream = orchestrator.chat_with_history(vec![Message::user("What day is it?")]).await?;
//! ```

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::error::Result;
use crate::mcp::McpRegistry;
use crate::normalized::NormalizedEvent;

use super::{LlmDriver, LlmRequest, Message, ToolCall, ToolCallFunction};

/// Error code attached to the event emitted when the turn limit is hit.
pub const MAX_TURNS_CODE: &str = "MAX_TURNS";

/// Boxed stream of events for one agent turn.
pub type TurnStream = Pin<Box<dyn Stream<Item = NormalizedEvent> + Send>>;

/// Accumulated state for a streaming tool call.
#[derive(Debug, Default, Clone)]
struct ToolCallAccumulator {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// LLM orchestrator with tool loop execution.
///
/// The orchestrator wraps an [`LlmDriver`] and adds:
/// - Tool call accumulation
/// - Tool execution via the MCP registry
/// - A bound on model round-trips per turn
#[derive(Clone)]
pub struct Orchestrator {
    driver: Arc<dyn LlmDriver>,
    registry: McpRegistry,
    instructions: String,
    max_turns: usize,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator that calls `driver` with tools from `registry`.
    pub fn new(
        driver: Arc<dyn LlmDriver>,
        registry: McpRegistry,
        instructions: impl Into<String>,
        max_turns: usize,
    ) -> Self {
        Self {
            driver,
            registry,
            instructions: instructions.into(),
            max_turns,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &McpRegistry {
        &self.registry
    }

    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    #[must_use]
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Start a turn with the given conversation history.
    ///
    /// Tool servers are connected and listed before the stream is returned,
    /// so registry failures surface here rather than as stream events. The
    /// stream yields:
    /// - `StreamStart` with a unique request ID
    /// - `MessageDelta` for assistant text
    /// - `ToolCallDelta` and `ToolCallComplete` for tool calls
    /// - `ToolResult` after each tool execution
    /// - `Error` if the model fails or the turn limit is exceeded
    /// - `Done` when the model produced its final answer
    ///
    /// # Errors
    ///
    /// Returns an error if a tool server cannot be connected or listed, or
    /// if two servers expose the same tool name.
    #[allow(clippy::too_many_lines)]
    pub async fn chat_with_history(&self, history: Vec<Message>) -> Result<TurnStream> {
        let request_id = Uuid::new_v4().to_string();
        let catalog = self.registry.tool_catalog().await?;
        let tools = catalog.openai_tools_json();

        tracing::info!(
            name: "agent.turn.start",
            request_id = %request_id,
            message_count = history.len(),
            tool_count = tools.len(),
            "Starting agent turn"
        );

        let driver = Arc::clone(&self.driver);
        let max_turns = self.max_turns;

        let mut message_json: Vec<serde_json::Value> =
            Vec::with_capacity(history.len() + 1);
        message_json.push(serde_json::json!({
            "role": "system",
            "content": self.instructions,
        }));
        for msg in &history {
            message_json.push(serde_json::to_value(msg).unwrap_or_default());
        }

        let stream = async_stream::stream! {
            yield NormalizedEvent::StreamStart {
                request_id: request_id.clone(),
            };

            let mut turn = 0;

            loop {
                if turn >= max_turns {
                    tracing::error!(
                        name: "agent.turn.max_turns",
                        request_id = %request_id,
                        max_turns = max_turns,
                        "Maximum turns exceeded"
                    );
                    yield NormalizedEvent::Error {
                        message: format!("Max turns ({max_turns}) exceeded"),
                        code: Some(MAX_TURNS_CODE.to_string()),
                    };
                    break;
                }
                turn += 1;

                tracing::debug!(
                    request_id = %request_id,
                    turn = turn,
                    message_count = message_json.len(),
                    "Sending request to LLM driver"
                );

                let req = LlmRequest {
                    messages: message_json.clone(),
                    tools: tools.clone(),
                };

                let driver_stream = match driver.stream(req).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!(
                            name: "agent.model.failed",
                            request_id = %request_id,
                            turn = turn,
                            error = %e,
                            "Failed to create driver stream"
                        );
                        yield NormalizedEvent::Error {
                            message: e.to_string(),
                            code: None,
                        };
                        break;
                    }
                };

                let mut tool_accumulators: BTreeMap<usize, ToolCallAccumulator> = BTreeMap::new();
                let mut assistant_text = String::new();

                futures::pin_mut!(driver_stream);

                while let Some(result) = driver_stream.next().await {
                    match result {
                        Ok(event) => {
                            match &event {
                                NormalizedEvent::MessageDelta { text } => {
                                    assistant_text.push_str(text);
                                }
                                NormalizedEvent::ToolCallDelta {
                                    call_index,
                                    id,
                                    name,
                                    arguments_delta,
                                } => {
                                    let acc = tool_accumulators.entry(*call_index).or_default();
                                    if acc.id.is_none() {
                                        acc.id.clone_from(id);
                                    }
                                    if acc.name.is_none() {
                                        acc.name.clone_from(name);
                                    }
                                    if let Some(delta) = arguments_delta {
                                        acc.arguments.push_str(delta);
                                    }
                                }
                                // The loop below decides when the turn is done.
                                NormalizedEvent::Done | NormalizedEvent::StreamStart { .. } => continue,
                                NormalizedEvent::Error { .. } => {
                                    yield event;
                                    return;
                                }
                                _ => {}
                            }
                            yield event;
                        }
                        Err(e) => {
                            tracing::error!(
                                name: "agent.model.failed",
                                request_id = %request_id,
                                turn = turn,
                                error = %e,
                                "Driver stream failed"
                            );
                            yield NormalizedEvent::Error {
                                message: e.to_string(),
                                code: None,
                            };
                            return;
                        }
                    }
                }

                let mut tool_calls: Vec<ToolCall> = Vec::with_capacity(tool_accumulators.len());
                for (call_index, acc) in tool_accumulators {
                    let Some(name) = acc.name else {
                        tracing::error!(
                            name: "agent.model.failed",
                            request_id = %request_id,
                            turn = turn,
                            call_index = call_index,
                            "Model sent a tool call without a name"
                        );
                        yield NormalizedEvent::Error {
                            message: format!("Model sent tool call #{call_index} without a function name"),
                            code: None,
                        };
                        return;
                    };
                    // Some OpenAI-compatible servers omit call ids.
                    let id = acc
                        .id
                        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
                    tool_calls.push(ToolCall {
                        id,
                        call_type: "function".to_string(),
                        function: ToolCallFunction {
                            name,
                            arguments: acc.arguments,
                        },
                    });
                }

                if tool_calls.is_empty() {
                    tracing::info!(
                        name: "agent.turn.complete",
                        request_id = %request_id,
                        turns = turn,
                        output_length = assistant_text.len(),
                        "Agent produced final output"
                    );
                    yield NormalizedEvent::Done;
                    break;
                }

                message_json.push(serde_json::json!({
                    "role": "assistant",
                    "content": if assistant_text.is_empty() { serde_json::Value::Null } else { serde_json::Value::String(assistant_text.clone()) },
                    "tool_calls": tool_calls,
                }));

                for tool_call in &tool_calls {
                    let tool_name = &tool_call.function.name;
                    tracing::info!(
                        name: "agent.tool.call",
                        request_id = %request_id,
                        turn = turn,
                        tool_id = %tool_call.id,
                        tool_name = %tool_name,
                        "Executing tool call"
                    );

                    let (content, success) = match parse_arguments(&tool_call.function.arguments) {
                        Err(e) => {
                            tracing::warn!(
                                name: "agent.tool.invalid_arguments",
                                request_id = %request_id,
                                tool_id = %tool_call.id,
                                tool_name = %tool_name,
                                error = %e,
                                "Tool call arguments rejected"
                            );
                            (format!("Error: invalid tool arguments: {e}"), false)
                        }
                        Ok(arguments) => match catalog.call(tool_name, arguments).await {
                            Ok(result) => {
                                let content = result_text(&result);
                                let success = !is_error_result(&result);
                                tracing::debug!(
                                    request_id = %request_id,
                                    tool_id = %tool_call.id,
                                    result_length = content.len(),
                                    success = success,
                                    "Tool call returned"
                                );
                                (content, success)
                            }
                            Err(e) => {
                                tracing::warn!(
                                    name: "agent.tool.failed",
                                    request_id = %request_id,
                                    tool_id = %tool_call.id,
                                    tool_name = %tool_name,
                                    error = %e,
                                    "Tool call failed"
                                );
                                (format!("Error: {e}"), false)
                            }
                        },
                    };

                    yield NormalizedEvent::ToolResult {
                        id: tool_call.id.clone(),
                        name: tool_name.clone(),
                        content: content.clone(),
                        success,
                    };

                    message_json.push(serde_json::json!({
                        "role": "tool",
                        "tool_call_id": tool_call.id,
                        "content": content
                    }));
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Parse the arguments the model streamed for a tool call.
///
/// Empty input means no arguments; anything else must be a JSON object.
fn parse_arguments(raw: &str) -> std::result::Result<serde_json::Value, String> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(e.to_string()),
    }
}

/// Whether an MCP tool result reports a tool-level failure.
fn is_error_result(result: &serde_json::Value) -> bool {
    result
        .get("isError")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// Render a tool result for the model.
///
/// MCP results carry a list of content blocks; text blocks are joined and
/// anything else falls back to the JSON form.
fn result_text(result: &serde_json::Value) -> String {
    let texts: Vec<&str> = result
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if texts.is_empty() {
        serde_json::to_string(result).unwrap_or_default()
    } else {
        texts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_text_joins_text_blocks() {
        let result = serde_json::json!({
            "content": [
                {"type": "text", "text": "2025-01-01"},
                {"type": "text", "text": "UTC"}
            ],
            "isError": false
        });
        assert_eq!(result_text(&result), "2025-01-01\nUTC");
    }

    #[test]
    fn empty_arguments_are_an_empty_object() {
        assert_eq!(parse_arguments("  ").unwrap(), serde_json::json!({}));
        assert_eq!(
            parse_arguments(r#"{"limit": 2}"#).unwrap(),
            serde_json::json!({"limit": 2})
        );
    }

    #[test]
    fn malformed_or_non_object_arguments_are_rejected() {
        assert!(parse_arguments(r#"{"limit": 2"#).is_err());
        let err = parse_arguments("[1, 2]").unwrap_err();
        assert!(err.contains("expected a JSON object"), "{err}");
    }

    #[test]
    fn detects_tool_level_errors() {
        assert!(is_error_result(&serde_json::json!({"content": [], "isError": true})));
        assert!(!is_error_result(&serde_json::json!({"content": [], "isError": false})));
        assert!(!is_error_result(&serde_json::json!({"content": []})));
    }

    #[test]
    fn result_text_falls_back_to_json() {
        let result = serde_json::json!({"structuredContent": {"n": 1}});
        assert_eq!(result_text(&result), r#"{"structuredContent":{"n":1}}"#);
    }
}
