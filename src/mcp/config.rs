use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{AppError, Result};

/// Default per-server session timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Transport used to reach a tool server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    /// Local subprocess speaking MCP over stdin/stdout.
    #[default]
    Stdio,
    /// Remote server reached over streamable HTTP.
    Http,
}

impl ServerKind {
    /// Lower-case name as written in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

/// One configured tool server, exactly as it appears under `mcp_servers`.
///
/// Fields are optional at this level so that a definition can be inspected
/// (and named) before it is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    #[serde(rename = "type", default)]
    pub kind: ServerKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Session timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl ServerDefinition {
    /// A stdio definition launching `command` with `args`.
    pub fn stdio(command: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            kind: ServerKind::Stdio,
            command: Some(command.into()),
            args: args.into_iter().map(Into::into).collect(),
            url: None,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// An http definition pointing at `url`.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            kind: ServerKind::Http,
            command: None,
            args: Vec::new(),
            url: Some(url.into()),
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Check that the fields required by the server kind are present.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            ServerKind::Stdio => {
                let has_command = self.command.as_deref().is_some_and(|c| !c.trim().is_empty());
                if !has_command {
                    return Err(AppError::Configuration(
                        "stdio MCP server definition is missing 'command'".to_string(),
                    ));
                }
            }
            ServerKind::Http => {
                let url = self.url.as_deref().filter(|u| !u.trim().is_empty()).ok_or_else(|| {
                    AppError::Configuration("http MCP server definition is missing 'url'".to_string())
                })?;
                Url::parse(url).map_err(|e| {
                    AppError::Configuration(format!("invalid url for http MCP server '{url}': {e}"))
                })?;
            }
        }
        Ok(())
    }
}
