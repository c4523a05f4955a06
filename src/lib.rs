//! MCP Agent Chat
//!
//! A browser chat front-end for a tool-using agent. The agent talks to an
//! OpenAI-compatible model and calls tools exposed by MCP servers, either
//! local subprocesses (stdio) or remote streamable-HTTP endpoints.
//!
//! # Architecture
//!
//! - **Registry**: one lazily connected handle per configured MCP server
//! - **Model client**: streaming Chat Completions driver for any compatible endpoint
//! - **Agent**: instructions + model + tools, with a bounded tool loop
//! - **Server**: Axum-based chat page and JSON/SSE API
//!
//! # Modules
//!
//! - [`mcp`]: MCP server definitions, handles and registry
//! - [`llm`]: Model client, driver and orchestrator
//! - [`agent`]: Agent assembly
//! - [`normalized`]: Unified streaming event model
//! - [`session`]: Per-tab transcript storage
//! - [`ui`]: Page and tools panel rendering

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod normalized;
pub mod server;
pub mod session;
pub mod ui;

use std::sync::Arc;

use agent::Agent;
use config::UiConfig;
use mcp::McpRegistry;
use session::SessionStore;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// MCP server registry, shared with the agent.
    pub registry: McpRegistry,
    /// The agent that answers chat turns.
    pub agent: Arc<Agent>,
    /// Per-tab transcripts.
    pub sessions: SessionStore,
    /// Page options.
    pub ui: Arc<UiConfig>,
}

impl AppState {
    pub fn new(agent: Agent, ui: UiConfig) -> Self {
        Self {
            registry: agent.registry().clone(),
            agent: Arc::new(agent),
            sessions: SessionStore::new(),
            ui: Arc::new(ui),
        }
    }
}
