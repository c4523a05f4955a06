//! Tools panel rendering.

use crate::error::AppError;
use crate::mcp::ToolDescriptor;

/// Shown when every server connected but none exposes a tool.
pub const NO_TOOLS_MESSAGE: &str = "No tools available from MCP servers.";

/// Render a tools listing as markdown, one section per server.
///
/// Descriptors are expected grouped by server, as
/// [`McpRegistry::list_all_tools`](crate::mcp::McpRegistry::list_all_tools)
/// returns them. Order is kept as given.
pub fn render_tools_listing(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return NO_TOOLS_MESSAGE.to_string();
    }

    let mut out = String::from("Available MCP Tools:\n\n");
    let mut current: Option<&str> = None;

    for tool in tools {
        if current != Some(tool.server_display_name.as_str()) {
            if current.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("**{}:**\n", tool.server_display_name));
            current = Some(&tool.server_display_name);
        }
        out.push_str(&format!("  • {}\n", tool.tool_name));
    }

    out.trim_end().to_string()
}

/// Render a listing failure inline.
pub fn render_tools_error(err: &AppError) -> String {
    format!("Error listing tools: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(server: &str, name: &str) -> ToolDescriptor {
        ToolDescriptor {
            server_display_name: server.to_string(),
            tool_name: name.to_string(),
        }
    }

    #[test]
    fn groups_tools_under_their_server() {
        let listing = render_tools_listing(&[
            tool("Date Mcp Server", "get_date"),
            tool("Date Mcp Server", "get_time_for_user"),
            tool("Pvc Company", "get_products"),
        ]);
        assert_eq!(
            listing,
            "Available MCP Tools:\n\n\
             **Date Mcp Server:**\n  • get_date\n  • get_time_for_user\n\n\
             **Pvc Company:**\n  • get_products"
        );
    }

    #[test]
    fn empty_listing_says_so() {
        assert_eq!(render_tools_listing(&[]), NO_TOOLS_MESSAGE);
    }

    #[test]
    fn error_is_rendered_inline() {
        let err = AppError::Connection {
            server: "Pvc Company".to_string(),
            message: "spawn failed".to_string(),
        };
        assert_eq!(
            render_tools_error(&err),
            "Error listing tools: Failed to connect to MCP server 'Pvc Company': spawn failed"
        );
    }
}
