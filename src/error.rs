//! Error taxonomy shared by the registry, the model client and the agent.
//!
//! Configuration and credential errors abort startup. Connection and
//! tool-list errors surface to the presentation layer, which renders them
//! inline instead of failing the request.

/// Errors produced by the application core.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The configuration file is missing, malformed, or lacks a required field.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An upper-case API key named an environment variable that is unset or empty.
    #[error("Environment variable {var} not found")]
    MissingCredential {
        /// Name of the environment variable that was looked up.
        var: String,
    },

    /// A tool server failed to connect.
    #[error("Failed to connect to MCP server '{server}': {message}")]
    Connection {
        /// Display name of the offending server.
        server: String,
        /// Underlying transport error.
        message: String,
    },

    /// A connected tool server failed to enumerate its tools.
    #[error("Failed to list tools from MCP server '{server}': {message}")]
    ToolList {
        /// Display name of the offending server.
        server: String,
        /// Underlying transport error.
        message: String,
    },

    /// A tool invocation failed.
    #[error("Tool call '{tool}' failed: {message}")]
    ToolCall {
        /// Tool name as exposed to the model.
        tool: String,
        /// Underlying error.
        message: String,
    },

    /// Two servers expose the same tool name to the model.
    #[error("Duplicate tool name '{name}' found across MCP servers")]
    DuplicateTool {
        /// The conflicting tool name.
        name: String,
    },

    /// The model endpoint failed or returned an error event.
    #[error("Model error: {0}")]
    Model(String),

    /// The agent did not produce a final answer within the configured turns.
    #[error("Max turns ({max_turns}) exceeded")]
    MaxTurnsExceeded {
        /// The configured limit.
        max_turns: usize,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
