//! Connection handles for individual tool servers.
//!
//! A [`ServerHandle`] pairs a [`ServerDefinition`] with a lazily established
//! session. Sessions are produced by a [`Connector`]; the default
//! [`RmcpConnector`] speaks MCP through `rmcp` over a child process or
//! streamable HTTP.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParam, JsonObject, Tool},
    service::ServiceExt,
    transport::{StreamableHttpClientTransport, TokioChildProcess},
};
use tokio::{process::Command, sync::OnceCell};

use super::config::{ServerDefinition, ServerKind};
use super::naming::display_name;
use crate::error::{AppError, Result};

type DynClientService = rmcp::service::RunningService<
    rmcp::service::RoleClient,
    Box<dyn rmcp::service::DynService<rmcp::service::RoleClient>>,
>;

/// An established session with one tool server.
#[async_trait]
pub trait ToolServerSession: Send + Sync + std::fmt::Debug {
    /// List every tool the server exposes, in the server's order.
    async fn list_tools(&self) -> anyhow::Result<Vec<Tool>>;

    /// Invoke a tool by its server-side name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Opens sessions for server definitions.
#[async_trait]
pub trait Connector: Send + Sync + std::fmt::Debug {
    async fn connect(
        &self,
        definition: &ServerDefinition,
    ) -> anyhow::Result<Arc<dyn ToolServerSession>>;
}

/// Connector backed by the `rmcp` client.
#[derive(Debug, Default, Clone, Copy)]
pub struct RmcpConnector;

#[async_trait]
impl Connector for RmcpConnector {
    async fn connect(
        &self,
        definition: &ServerDefinition,
    ) -> anyhow::Result<Arc<dyn ToolServerSession>> {
        let timeout = definition.timeout();

        let service = match definition.kind {
            ServerKind::Stdio => {
                let command = definition
                    .command
                    .as_deref()
                    .ok_or_else(|| anyhow!("stdio server has no command"))?;
                let mut cmd = Command::new(command);
                cmd.args(&definition.args);

                let transport = TokioChildProcess::new(cmd)
                    .with_context(|| format!("failed to spawn '{command}'"))?;
                with_timeout(timeout, "initialize", ().into_dyn().serve(transport))
                    .await?
                    .context("MCP initialize over stdio failed")?
            }
            ServerKind::Http => {
                let url = definition
                    .url
                    .as_deref()
                    .ok_or_else(|| anyhow!("http server has no url"))?;
                let transport = StreamableHttpClientTransport::from_uri(url.to_string());
                with_timeout(timeout, "initialize", ().into_dyn().serve(transport))
                    .await?
                    .context("MCP initialize over streamable HTTP failed")?
            }
        };

        Ok(Arc::new(RmcpSession { service, timeout }))
    }
}

async fn with_timeout<F: Future>(timeout: Duration, what: &str, fut: F) -> anyhow::Result<F::Output> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|elapsed| anyhow!("{what} timed out after {}s ({elapsed})", timeout.as_secs()))
}

struct RmcpSession {
    service: DynClientService,
    timeout: Duration,
}

impl std::fmt::Debug for RmcpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RmcpSession")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ToolServerSession for RmcpSession {
    async fn list_tools(&self) -> anyhow::Result<Vec<Tool>> {
        let tools = with_timeout(self.timeout, "tools/list", self.service.list_all_tools())
            .await?
            .context("tools/list failed")?;
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> anyhow::Result<serde_json::Value> {
        let request = CallToolRequestParam {
            name: name.to_string().into(),
            arguments,
        };
        let res = with_timeout(self.timeout, "tools/call", self.service.call_tool(request))
            .await?
            .with_context(|| format!("tools/call failed for '{name}'"))?;
        Ok(serde_json::to_value(res)?)
    }
}

/// A configured tool server and its (possibly not yet opened) session.
pub struct ServerHandle {
    definition: ServerDefinition,
    display_name: String,
    connector: Arc<dyn Connector>,
    session: OnceCell<Arc<dyn ToolServerSession>>,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("display_name", &self.display_name)
            .field("definition", &self.definition)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl ServerHandle {
    /// Validate `definition` and wrap it in an unconnected handle.
    pub fn new(definition: ServerDefinition, connector: Arc<dyn Connector>) -> Result<Self> {
        definition.validate()?;
        let display_name = display_name(&definition);
        Ok(Self {
            definition,
            display_name,
            connector,
            session: OnceCell::new(),
        })
    }

    pub fn definition(&self) -> &ServerDefinition {
        &self.definition
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_connected(&self) -> bool {
        self.session.initialized()
    }

    /// Connect if not already connected.
    ///
    /// Concurrent callers share a single connection attempt; a failed attempt
    /// leaves the handle unconnected so a later call dials again.
    pub async fn connect(&self) -> Result<()> {
        self.session().await.map(|_| ())
    }

    async fn session(&self) -> Result<&Arc<dyn ToolServerSession>> {
        self.session
            .get_or_try_init(|| async {
                tracing::info!(
                    name: "mcp.server.connecting",
                    server = %self.display_name,
                    kind = self.definition.kind.as_str(),
                    timeout_secs = self.definition.timeout,
                    "Connecting to MCP server"
                );
                let session = self
                    .connector
                    .connect(&self.definition)
                    .await
                    .map_err(|e| AppError::Connection {
                        server: self.display_name.clone(),
                        message: format!("{e:#}"),
                    })?;
                tracing::info!(name: "mcp.server.connected", server = %self.display_name, "MCP server connected");
                Ok(session)
            })
            .await
    }

    /// Connect if needed, then list the server's tools.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let session = self.session().await?;
        session.list_tools().await.map_err(|e| AppError::ToolList {
            server: self.display_name.clone(),
            message: format!("{e:#}"),
        })
    }

    /// Connect if needed, then invoke `tool` with JSON `arguments`.
    pub async fn call_tool(&self, tool: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let session = self.session().await?;
        session
            .call_tool(tool, arguments.as_object().cloned())
            .await
            .map_err(|e| AppError::ToolCall {
                tool: tool.to_string(),
                message: format!("{e:#}"),
            })
    }
}
