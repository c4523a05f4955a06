//! Session and conversation transcript management.
//!
//! Each browser tab gets its own [`Session`], identified by UUID, holding
//! the user/assistant exchanges shown in its transcript. Sessions live in
//! memory and are dropped after [`DEFAULT_SESSION_TIMEOUT`] of inactivity.
//!
//! # Example
//!
//! ```rust
//! use mcp_agent_chat::session::SessionStore;
//!
//! let store = SessionStore::new();
//! let session = store.create();
//! session.add_user_message("Hello!");
//!
//! let messages = session.messages();
//! assert_eq!(messages.len(), 1);
//! ```

mod thread;

pub use thread::{DEFAULT_SESSION_TIMEOUT, PendingTurn, Session, SessionState, SessionStore};
