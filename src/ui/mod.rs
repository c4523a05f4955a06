//! Server-rendered chat page and tools panel.
//!
//! # Structure
//!
//! - [`page`]: the HTML shell built from the `ui` configuration section
//! - [`tools`]: markdown rendering of the MCP tools listing

pub mod page;
pub mod tools;

pub use page::render_page;
pub use tools::{NO_TOOLS_MESSAGE, render_tools_error, render_tools_listing};
