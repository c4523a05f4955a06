//! Agent assembly.
//!
//! An [`Agent`] binds a model driver and the tool-server registry under a
//! name and a set of instructions. Turn-taking and tool dispatch belong to
//! the [`Orchestrator`]; the agent only composes it and folds its event
//! stream into a final answer.

use std::sync::Arc;

use futures::StreamExt;

use crate::config::ChatConfig;
use crate::error::{AppError, Result};
use crate::llm::orchestrator::{MAX_TURNS_CODE, TurnStream};
use crate::llm::{LlmDriver, Message, Orchestrator};
use crate::mcp::{McpRegistry, ServerHandle};
use crate::normalized::NormalizedEvent;

/// A conversational agent with access to every configured tool server.
#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    orchestrator: Orchestrator,
}

/// One tool invocation made during a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub name: String,
    pub success: bool,
}

/// Result of running the agent to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Text of the model's final answer.
    pub final_output: String,
    /// Tool calls executed along the way, in order.
    pub tool_calls: Vec<ToolInvocation>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        max_turns: usize,
        driver: Arc<dyn LlmDriver>,
        registry: McpRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            orchestrator: Orchestrator::new(driver, registry, instructions, max_turns),
        }
    }

    /// Compose an agent from the `chat` configuration section.
    pub fn assemble(chat: &ChatConfig, driver: Arc<dyn LlmDriver>, registry: McpRegistry) -> Self {
        let agent = Self::new(
            chat.agent_name.clone(),
            chat.agent_instructions.clone(),
            chat.max_turns,
            driver,
            registry,
        );
        tracing::info!(
            name: "agent.assembled",
            agent = %agent.name,
            max_turns = chat.max_turns,
            server_count = agent.registry().len(),
            "Agent assembled"
        );
        agent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        self.orchestrator.instructions()
    }

    pub fn max_turns(&self) -> usize {
        self.orchestrator.max_turns()
    }

    pub fn registry(&self) -> &McpRegistry {
        self.orchestrator.registry()
    }

    /// The tool servers this agent may call.
    pub fn servers(&self) -> &[Arc<ServerHandle>] {
        self.registry().handles()
    }

    /// Run one turn over `history` and expose the raw event stream.
    ///
    /// # Errors
    ///
    /// Fails before streaming if the tool catalog cannot be assembled.
    pub async fn run_streamed(&self, history: Vec<Message>) -> Result<TurnStream> {
        self.orchestrator.chat_with_history(history).await
    }

    /// Run one turn over `history` until the model gives a final answer.
    ///
    /// Text streamed before a tool call is an intermediate step and is
    /// dropped; only the text after the last tool result is returned.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::MaxTurnsExceeded`] when the model keeps calling
    /// tools past the turn limit and [`AppError::Model`] on model failures.
    pub async fn run(&self, history: Vec<Message>) -> Result<RunOutcome> {
        let mut stream = self.run_streamed(history).await?;
        let mut final_output = String::new();
        let mut tool_calls = Vec::new();

        while let Some(event) = stream.next().await {
            match event {
                NormalizedEvent::MessageDelta { text } => final_output.push_str(&text),
                NormalizedEvent::ToolResult { name, success, .. } => {
                    final_output.clear();
                    tool_calls.push(ToolInvocation { name, success });
                }
                NormalizedEvent::Error { message, code } => {
                    return Err(if code.as_deref() == Some(MAX_TURNS_CODE) {
                        AppError::MaxTurnsExceeded {
                            max_turns: self.max_turns(),
                        }
                    } else {
                        AppError::Model(message)
                    });
                }
                NormalizedEvent::Done => break,
                _ => {}
            }
        }

        Ok(RunOutcome {
            final_output,
            tool_calls,
        })
    }
}
