//! Model Context Protocol (MCP) client surface.
//!
//! This module registers heterogeneous capability providers behind one
//! interface: remote servers reached through rmcp transports and in-process
//! objects reached through a synchronous paired channel. The registry owns
//! one connection per server and routes tool and prompt names to their
//! first-registered owner.
//!
//! # Configuration
//!
//! Remote MCP servers are configured via `mcp.json`:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "todo-server": {
//!       "url": "http://localhost:5000/mcp"
//!     }
//!   }
//! }
//! ```
//!
//! Embedded servers are registered in code with
//! [`registry::ServerRegistry::register_embedded_server`].

pub mod channel;
pub mod config;
pub mod embedded;
pub mod error;
pub mod registry;
pub mod types;
