use crate::error::{AppError, Result};
use crate::mcp::config::ServerDefinition;
use crate::mcp::handle::{Connector, RmcpConnector, ServerHandle};
use rmcp::model::Tool;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};

/// One tool as shown in the tools panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub server_display_name: String,
    pub tool_name: String,
}

/// All configured tool servers, in configuration order.
///
/// Cloning is cheap and clones share the same handles, so one registry built
/// at startup can be handed to the agent and to every request handler.
#[derive(Clone)]
pub struct McpRegistry {
    handles: Arc<Vec<Arc<ServerHandle>>>,
}

impl std::fmt::Debug for McpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpRegistry")
            .field("server_count", &self.handles.len())
            .field(
                "connected",
                &self.handles.iter().filter(|h| h.is_connected()).count(),
            )
            .finish()
    }
}

impl McpRegistry {
    /// Build one `rmcp`-backed handle per definition.
    pub fn build_from_config(definitions: &[ServerDefinition]) -> Result<Self> {
        Self::with_connector(definitions, Arc::new(RmcpConnector))
    }

    /// Build handles that open their sessions through `connector`.
    pub fn with_connector(
        definitions: &[ServerDefinition],
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let handles = definitions
            .iter()
            .map(|def| ServerHandle::new(def.clone(), Arc::clone(&connector)).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        for handle in &handles {
            tracing::debug!(
                name: "mcp.server.configured",
                server = %handle.display_name(),
                kind = handle.definition().kind.as_str(),
                "MCP server configured"
            );
        }

        Ok(Self {
            handles: Arc::new(handles),
        })
    }

    pub fn handles(&self) -> &[Arc<ServerHandle>] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Connect every handle that is not yet connected, in order.
    ///
    /// Stops at the first failure; handles connected before it stay connected.
    pub async fn connect_all(&self) -> Result<()> {
        for handle in self.handles.iter() {
            handle.connect().await?;
        }
        Ok(())
    }

    /// List every tool of every server, grouped by server in registry order.
    ///
    /// A server that fails to connect or list aborts the whole listing. A
    /// server exposing no tools simply contributes nothing.
    pub async fn list_all_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut out = Vec::new();
        for handle in self.handles.iter() {
            let tools = handle.list_tools().await?;
            out.extend(tools.into_iter().map(|t| ToolDescriptor {
                server_display_name: handle.display_name().to_string(),
                tool_name: t.name.to_string(),
            }));
        }
        tracing::info!(
            name: "mcp.tools.listed",
            server_count = self.handles.len(),
            tool_count = out.len(),
            "Listed tools from MCP servers"
        );
        Ok(out)
    }

    /// Collect the tools of every server into a catalog the model can call.
    pub async fn tool_catalog(&self) -> Result<ToolCatalog> {
        let mut entries = Vec::new();
        let mut index = HashMap::new();

        for handle in self.handles.iter() {
            for tool in handle.list_tools().await? {
                let exposed = sanitize_tool_name(&tool.name);
                if index.insert(exposed.clone(), entries.len()).is_some() {
                    return Err(AppError::DuplicateTool { name: exposed });
                }
                entries.push(CatalogEntry {
                    exposed_name: exposed,
                    handle: Arc::clone(handle),
                    tool,
                });
            }
        }

        Ok(ToolCatalog { entries, index })
    }
}

/// Sanitize tool names for `OpenAI` API compatibility.
fn sanitize_tool_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

struct CatalogEntry {
    exposed_name: String,
    handle: Arc<ServerHandle>,
    tool: Tool,
}

/// Tools available to one agent turn, keyed by the name the model sees.
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolCatalog {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.exposed_name.as_str())
    }

    /// Tools in `OpenAI` function-calling format.
    pub fn openai_tools_json(&self) -> Vec<serde_json::Value> {
        self.entries
            .iter()
            .map(|e| {
                // rmcp Tool uses input_schema as an Arc<JsonObject>; convert to serde_json.
                let params = serde_json::to_value(&*e.tool.input_schema)
                    .unwrap_or_else(|_| serde_json::json!({"type":"object","properties":{}}));

                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": e.exposed_name,
                        "description": e.tool.description.as_deref().unwrap_or(""),
                        "parameters": params
                    }
                })
            })
            .collect()
    }

    /// Dispatch a call to the server that owns `exposed_name`.
    pub async fn call(
        &self,
        exposed_name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let entry = self
            .index
            .get(exposed_name)
            .and_then(|&i| self.entries.get(i))
            .ok_or_else(|| AppError::ToolCall {
                tool: exposed_name.to_string(),
                message: "unknown tool".to_string(),
            })?;

        tracing::debug!(
            name: "mcp.tool.call",
            server = %entry.handle.display_name(),
            tool = %entry.tool.name,
            "Dispatching tool call"
        );
        entry.handle.call_tool(&entry.tool.name, arguments).await
    }
}
