//! Model Context Protocol (MCP) tool-server connections.
//!
//! This module keeps one handle per configured tool server, connects them
//! lazily and enumerates their tools.
//!
//! # Configuration
//!
//! Servers are listed under `mcp_servers` in the configuration file:
//!
//! ```json
//! {
//!   "mcp_servers": [
//!     { "type": "stdio", "command": "python", "args": ["servers/date_mcp_server.py"] },
//!     { "type": "http", "url": "http://localhost:3000/mcp", "timeout": 60 }
//!   ]
//! }
//! ```
//!
//! # Display names
//!
//! Each server gets a readable name derived from its launch parameters, see
//! [`naming::display_name`].

pub mod config;
pub mod handle;
pub mod naming;
pub mod registry;

pub use config::{ServerDefinition, ServerKind};
pub use handle::{Connector, RmcpConnector, ServerHandle, ToolServerSession};
pub use registry::{McpRegistry, ToolCatalog, ToolDescriptor};
