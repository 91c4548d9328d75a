//! Server connection registry and capability router.
//!
//! One [`ServerConnection`] per registered server, held in registration
//! order. Both transport kinds land behind the same [`ServerHandle`] seam:
//! remote servers through rmcp (streamable HTTP with an SSE fallback),
//! embedded servers through a paired channel. Capability lists are fixed at
//! registration time; there is no live re-discovery.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParam, GetPromptRequestParam},
    service::ServiceExt,
    transport::{SseClientTransport, StreamableHttpClientTransport},
};
use url::Url;

use crate::mcp::channel::ChannelHalf;
use crate::mcp::config::{McpConfig, expand_env_placeholders};
use crate::mcp::embedded::{ChannelHandle, EmbeddedServer};
use crate::mcp::error::McpError;
use crate::mcp::types::{
    CallToolResult, GetPromptResult, ListPromptsResult, ListToolsResult, PromptDescriptor,
    PromptPayload, ToolDescriptor, ToolOutcome,
};

/// The call/response surface every connection handle answers, regardless of
/// transport kind.
#[async_trait]
pub trait ServerHandle: Send + Sync + std::fmt::Debug {
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolDescriptor>>;
    async fn list_prompts(&self) -> anyhow::Result<Vec<PromptDescriptor>>;
    async fn call_tool(&self, name: &str, arguments: serde_json::Value)
    -> anyhow::Result<ToolOutcome>;
    async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> anyhow::Result<PromptPayload>;
}

type DynClientService = rmcp::service::RunningService<
    rmcp::service::RoleClient,
    Box<dyn rmcp::service::DynService<rmcp::service::RoleClient>>,
>;

/// One registered capability provider.
///
/// Created at registration time; the capability lists are populated once,
/// directly after connecting, and never updated afterward.
#[derive(Debug)]
pub struct ServerConnection {
    pub name: String,
    pub handle: Arc<dyn ServerHandle>,
    pub tools: Vec<ToolDescriptor>,
    pub prompts: Vec<PromptDescriptor>,
}

/// Registry of server connections, in registration order.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    connections: Vec<ServerConnection>,
}

impl ServerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every server listed in an `mcp.json` config.
    ///
    /// Each server is independently fallible: a connectivity failure is
    /// logged and that server is simply absent from the catalog. Entries are
    /// registered in name order so router resolution stays deterministic
    /// across runs.
    pub async fn from_config(cfg: &McpConfig) -> Self {
        let mut registry = Self::new();
        let mut names: Vec<&String> = cfg.mcp_servers.keys().collect();
        names.sort();
        for name in names {
            let entry = &cfg.mcp_servers[name];
            let endpoint = expand_env_placeholders(&entry.url);
            if let Err(e) = registry.register_network_server(name, &endpoint).await {
                tracing::error!(server = %name, error = %e, "skipping unreachable MCP server");
            }
        }
        registry
    }

    /// Connect to a remote server and register it.
    ///
    /// Tries the streamable HTTP transport first and falls back to the SSE
    /// transport if the peer rejects it; which one succeeded is an
    /// implementation detail and never surfaced to the caller.
    pub async fn register_network_server(
        &mut self,
        name: &str,
        endpoint: &str,
    ) -> Result<(), McpError> {
        let url = Url::parse(endpoint).map_err(|e| McpError::Connectivity {
            server: name.to_string(),
            source: anyhow::anyhow!("invalid endpoint url '{endpoint}': {e}"),
        })?;

        let service = match connect_streamable(&url).await {
            Ok(service) => {
                tracing::debug!(server = name, "connected via streamable HTTP transport");
                service
            }
            Err(primary) => {
                tracing::warn!(
                    server = name,
                    error = %primary,
                    "streamable HTTP transport rejected, retrying with SSE"
                );
                connect_sse(&url)
                    .await
                    .map_err(|fallback| McpError::Connectivity {
                        server: name.to_string(),
                        source: fallback.context(format!("primary transport failed: {primary}")),
                    })?
            }
        };

        let handle: Arc<dyn ServerHandle> = Arc::new(RemoteHandle { service });
        self.finish_registration(name, handle).await;
        Ok(())
    }

    /// Register an in-process server over a freshly created paired channel.
    pub async fn register_embedded_server(&mut self, server: &dyn EmbeddedServer) {
        let (server_half, client_half) = ChannelHalf::pair();
        server.connect(server_half);
        let handle: Arc<dyn ServerHandle> = Arc::new(ChannelHandle::attach(client_half));
        self.finish_registration(server.name(), handle).await;
    }

    /// Run discovery and store the connection.
    ///
    /// A discovery failure is not a registration failure: a server with
    /// tools but no prompts (or vice versa) is valid, so each listing is
    /// recovered independently as empty.
    async fn finish_registration(&mut self, name: &str, handle: Arc<dyn ServerHandle>) {
        let tools = match handle.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                tracing::warn!(
                    server = name,
                    error = %e,
                    "tool discovery failed, registering with no tools"
                );
                Vec::new()
            }
        };
        let prompts = match handle.list_prompts().await {
            Ok(prompts) => prompts,
            Err(e) => {
                tracing::warn!(
                    server = name,
                    error = %e,
                    "prompt discovery failed, registering with no prompts"
                );
                Vec::new()
            }
        };

        // Duplicate names resolve to the first-registered owner; make the
        // shadowing observable without changing that behavior.
        for tool in &tools {
            if self.connection_for_tool(&tool.name).is_ok() {
                tracing::debug!(
                    server = name,
                    tool = %tool.name,
                    "tool name shadowed by an earlier registration"
                );
            }
        }
        for prompt in &prompts {
            if self.connection_for_prompt(&prompt.name).is_ok() {
                tracing::debug!(
                    server = name,
                    prompt = %prompt.name,
                    "prompt name shadowed by an earlier registration"
                );
            }
        }

        tracing::info!(
            server = name,
            tool_count = tools.len(),
            prompt_count = prompts.len(),
            "registered MCP server"
        );

        self.connections.push(ServerConnection {
            name: name.to_string(),
            handle,
            tools,
            prompts,
        });
    }

    /// All registered connections, in registration order.
    #[must_use]
    pub fn connections(&self) -> &[ServerConnection] {
        &self.connections
    }

    /// Flattened tool catalog across all connections.
    #[must_use]
    pub fn tools(&self) -> Vec<&ToolDescriptor> {
        self.connections.iter().flat_map(|c| &c.tools).collect()
    }

    /// Flattened prompt catalog across all connections.
    #[must_use]
    pub fn prompts(&self) -> Vec<&PromptDescriptor> {
        self.connections.iter().flat_map(|c| &c.prompts).collect()
    }

    /// Tool catalog projected into OpenAI function schemas.
    #[must_use]
    pub fn openai_tools_json(&self) -> Vec<serde_json::Value> {
        self.tools()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description.as_deref().unwrap_or(""),
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect()
    }

    /// Resolve the owning connection for a tool name.
    ///
    /// Linear scan in registration order, first case-sensitive exact match
    /// wins.
    pub fn connection_for_tool(&self, name: &str) -> Result<&ServerConnection, McpError> {
        self.connections
            .iter()
            .find(|c| c.tools.iter().any(|t| t.name == name))
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))
    }

    /// Resolve the owning connection for a prompt name.
    pub fn connection_for_prompt(&self, name: &str) -> Result<&ServerConnection, McpError> {
        self.connections
            .iter()
            .find(|c| c.prompts.iter().any(|p| p.name == name))
            .ok_or_else(|| McpError::PromptNotFound(name.to_string()))
    }

    /// Route a tool call to its owning connection and execute it.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutcome, McpError> {
        let connection = self.connection_for_tool(name)?;
        connection
            .handle
            .call_tool(name, arguments)
            .await
            .map_err(|source| McpError::Execution {
                server: connection.name.clone(),
                name: name.to_string(),
                source,
            })
    }

    /// Route a prompt fetch to its owning connection.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<PromptPayload, McpError> {
        let connection = self.connection_for_prompt(name)?;
        connection
            .handle
            .get_prompt(name, arguments)
            .await
            .map_err(|source| McpError::Execution {
                server: connection.name.clone(),
                name: name.to_string(),
                source,
            })
    }
}

async fn connect_streamable(url: &Url) -> anyhow::Result<DynClientService> {
    let transport = StreamableHttpClientTransport::from_uri(url.to_string());
    Ok(().into_dyn().serve(transport).await?)
}

async fn connect_sse(url: &Url) -> anyhow::Result<DynClientService> {
    let transport = SseClientTransport::start(url.to_string()).await?;
    Ok(().into_dyn().serve(transport).await?)
}

/// Remote connection handle backed by an rmcp client service.
///
/// rmcp results are converted through their JSON form into the crate's
/// wire-neutral types (simplified, content-first).
struct RemoteHandle {
    service: DynClientService,
}

impl std::fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteHandle").finish_non_exhaustive()
    }
}

#[async_trait]
impl ServerHandle for RemoteHandle {
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        let res = self.service.list_tools(Default::default()).await?;
        let listing: ListToolsResult = serde_json::from_value(serde_json::to_value(res)?)?;
        Ok(listing.tools)
    }

    async fn list_prompts(&self) -> anyhow::Result<Vec<PromptDescriptor>> {
        let res = self.service.list_prompts(Default::default()).await?;
        let listing: ListPromptsResult = serde_json::from_value(serde_json::to_value(res)?)?;
        Ok(listing.prompts)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> anyhow::Result<ToolOutcome> {
        let res = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
            })
            .await?;
        let raw: CallToolResult = serde_json::from_value(serde_json::to_value(res)?)?;
        Ok(raw.into())
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> anyhow::Result<PromptPayload> {
        let res = self
            .service
            .get_prompt(GetPromptRequestParam {
                name: name.to_string().into(),
                arguments: arguments.and_then(|a| a.as_object().cloned()),
            })
            .await?;
        let raw: GetPromptResult = serde_json::from_value(serde_json::to_value(res)?)?;
        Ok(raw.into())
    }
}
