//! Embedded capability servers: in-process objects that masquerade as MCP
//! peers over a paired channel.
//!
//! An [`EmbeddedServer`] owns the server half of a channel and answers the
//! same method surface a remote server would (`tools/list`, `tools/call`,
//! `prompts/list`, `prompts/get`). [`ChannelHandle`] is the client side: it
//! implements [`ServerHandle`] so the registry and the loop never branch on
//! connection kind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::mcp::channel::{ChannelHalf, WireMessage};
use crate::mcp::registry::ServerHandle;
use crate::mcp::types::{
    ListPromptsResult, ListToolsResult, PromptArgument, PromptDescriptor, PromptPayload,
    ToolDescriptor, ToolOutcome,
};

/// An in-process object that can play the role of a server.
///
/// `connect` receives the server half of a freshly created paired channel and
/// must wire its message handler before returning; discovery queries follow
/// immediately.
pub trait EmbeddedServer: Send + Sync {
    fn name(&self) -> &str;
    fn connect(&self, half: ChannelHalf);
}

type ToolHandler = Arc<dyn Fn(&serde_json::Value) -> Result<String, String> + Send + Sync>;
type PromptHandler = Arc<dyn Fn(&serde_json::Value) -> PromptPayload + Send + Sync>;

/// Builder-style embedded server: register tools and prompts with handlers,
/// then hand it to [`ServerRegistry::register_embedded_server`].
///
/// Tool handlers return `Err` for domain-level failures; those are reported
/// to the caller as `isError` results, not transport faults.
///
/// [`ServerRegistry::register_embedded_server`]: crate::mcp::registry::ServerRegistry::register_embedded_server
#[derive(Clone)]
pub struct ToolServer {
    name: String,
    tools: Vec<(ToolDescriptor, ToolHandler)>,
    prompts: Vec<(PromptDescriptor, PromptHandler)>,
}

impl std::fmt::Debug for ToolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServer")
            .field("name", &self.name)
            .field("tool_count", &self.tools.len())
            .field("prompt_count", &self.prompts.len())
            .finish()
    }
}

impl ToolServer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
            prompts: Vec::new(),
        }
    }

    /// Register a tool with its argument schema and handler.
    #[must_use]
    pub fn tool<F>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&serde_json::Value) -> Result<String, String> + Send + Sync + 'static,
    {
        let descriptor = ToolDescriptor {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        };
        self.tools.push((descriptor, Arc::new(handler)));
        self
    }

    /// Register a prompt with its (possibly empty) argument list and renderer.
    #[must_use]
    pub fn prompt<F>(
        mut self,
        name: impl Into<String>,
        arguments: Option<Vec<PromptArgument>>,
        render: F,
    ) -> Self
    where
        F: Fn(&serde_json::Value) -> PromptPayload + Send + Sync + 'static,
    {
        let descriptor = PromptDescriptor {
            name: name.into(),
            description: None,
            arguments,
        };
        self.prompts.push((descriptor, Arc::new(render)));
        self
    }
}

impl EmbeddedServer for ToolServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self, half: ChannelHalf) {
        let tools = self.tools.clone();
        let prompts = self.prompts.clone();
        let responder = half.clone();
        half.on_message(move |msg| {
            if let WireMessage::Request { id, method, params } = msg {
                let result = dispatch(&tools, &prompts, &method, &params);
                responder.send(WireMessage::Response { id, result });
            }
        });
    }
}

fn dispatch(
    tools: &[(ToolDescriptor, ToolHandler)],
    prompts: &[(PromptDescriptor, PromptHandler)],
    method: &str,
    params: &serde_json::Value,
) -> Result<serde_json::Value, String> {
    match method {
        "tools/list" => {
            let listing = ListToolsResult {
                tools: tools.iter().map(|(d, _)| d.clone()).collect(),
                next_cursor: None,
            };
            serde_json::to_value(listing).map_err(|e| e.to_string())
        }
        "tools/call" => {
            let name = params
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or("tools/call missing tool name")?;
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            let (_, handler) = tools
                .iter()
                .find(|(d, _)| d.name == name)
                .ok_or_else(|| format!("unknown tool: {name}"))?;
            let (text, is_error) = match handler(&arguments) {
                Ok(text) => (text, false),
                Err(text) => (text, true),
            };
            Ok(serde_json::json!({
                "content": [{"type": "text", "text": text}],
                "isError": is_error,
            }))
        }
        "prompts/list" => {
            let listing = ListPromptsResult {
                prompts: prompts.iter().map(|(d, _)| d.clone()).collect(),
                next_cursor: None,
            };
            serde_json::to_value(listing).map_err(|e| e.to_string())
        }
        "prompts/get" => {
            let name = params
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or("prompts/get missing prompt name")?;
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            let (_, render) = prompts
                .iter()
                .find(|(d, _)| d.name == name)
                .ok_or_else(|| format!("unknown prompt: {name}"))?;
            let payload = render(&arguments);
            let mut result = serde_json::json!({
                "messages": [
                    {"role": "user", "content": {"type": "text", "text": payload.text}}
                ],
            });
            if let Some(meta) = payload.meta {
                result["_meta"] = meta;
            }
            Ok(result)
        }
        other => Err(format!("unsupported method: {other}")),
    }
}

/// Client half of an embedded connection.
///
/// Because channel delivery is synchronous, the response to a request has
/// already landed in `pending` by the time `send` returns; correlation is a
/// simple id-keyed removal with no waiting.
#[derive(Debug)]
pub struct ChannelHandle {
    half: ChannelHalf,
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, Result<serde_json::Value, String>>>>,
}

impl ChannelHandle {
    /// Wire a client onto its half of a paired channel.
    #[must_use]
    pub fn attach(half: ChannelHalf) -> Self {
        let pending: Arc<Mutex<HashMap<u64, Result<serde_json::Value, String>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let sink = Arc::clone(&pending);
        half.on_message(move |msg| {
            if let WireMessage::Response { id, result } = msg {
                sink.lock().unwrap().insert(id, result);
            }
        });
        Self {
            half,
            next_id: AtomicU64::new(1),
            pending,
        }
    }

    fn request(&self, method: &str, params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.half.send(WireMessage::Request {
            id,
            method: method.to_string(),
            params,
        });
        match self.pending.lock().unwrap().remove(&id) {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow!("{method} failed: {message}")),
            None => Err(anyhow!(
                "no response for '{method}' request {id} (peer closed or not wired)"
            )),
        }
    }
}

#[async_trait]
impl ServerHandle for ChannelHandle {
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        let listing: ListToolsResult =
            serde_json::from_value(self.request("tools/list", serde_json::json!({}))?)?;
        Ok(listing.tools)
    }

    async fn list_prompts(&self) -> anyhow::Result<Vec<PromptDescriptor>> {
        let listing: ListPromptsResult =
            serde_json::from_value(self.request("prompts/list", serde_json::json!({}))?)?;
        Ok(listing.prompts)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> anyhow::Result<ToolOutcome> {
        let raw = self.request(
            "tools/call",
            serde_json::json!({"name": name, "arguments": arguments}),
        )?;
        let result: crate::mcp::types::CallToolResult = serde_json::from_value(raw)?;
        Ok(result.into())
    }

    async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> anyhow::Result<PromptPayload> {
        let raw = self.request(
            "prompts/get",
            serde_json::json!({"name": name, "arguments": arguments.unwrap_or_else(|| serde_json::json!({}))}),
        )?;
        let result: crate::mcp::types::GetPromptResult = serde_json::from_value(raw)?;
        Ok(result.into())
    }
}
