//! MCP-side error taxonomy.
//!
//! Discovery failures (tool/prompt listing after a successful connect) are
//! deliberately not represented here: the registry recovers them locally as
//! an empty capability list, so they never cross a public boundary.

use thiserror::Error;

/// Errors surfaced by the registry and the capability router.
#[derive(Debug, Error)]
pub enum McpError {
    /// Both the primary and the fallback transport failed to connect.
    /// The server is simply absent from the catalog.
    #[error("failed to connect MCP server '{server}': {source}")]
    Connectivity {
        server: String,
        #[source]
        source: anyhow::Error,
    },

    /// No registered connection advertises the named tool.
    #[error("no registered server advertises tool '{0}'")]
    ToolNotFound(String),

    /// No registered connection advertises the named prompt.
    #[error("no registered server advertises prompt '{0}'")]
    PromptNotFound(String),

    /// The owning connection's call itself failed (transport fault or a
    /// malformed response, as opposed to a domain-level `isError` result).
    #[error("call '{name}' failed on server '{server}': {source}")]
    Execution {
        server: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
