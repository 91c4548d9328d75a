//! Tool-call resolution loop and prompt resolution.
//!
//! The host drives the conversation: send the transcript and the capability
//! catalog to the model, execute whatever tool calls come back, feed the
//! results into the transcript, and repeat until the model produces a plain
//! answer. The loop is bounded; a model that never converges gets one forced
//! final call after the ceiling and nothing more.

use std::sync::Arc;

use thiserror::Error;

use crate::mcp::error::McpError;
use crate::mcp::registry::ServerRegistry;
use crate::session::ChatThread;

use super::{LlmDriver, LlmReply, LlmRequest, ToolCall};

/// Default ceiling on extra tool rounds per user turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// Errors surfaced by the host to its caller.
///
/// Tool-level failures never appear here: inside the loop they are converted
/// into correlated `tool` error messages so the model can react.
#[derive(Debug, Error)]
pub enum HostError {
    /// Capability routing failed at a boundary where it must propagate
    /// (prompt resolution, not tool dispatch).
    #[error(transparent)]
    Mcp(#[from] McpError),

    /// The model request itself failed.
    #[error("model request failed")]
    Model(#[source] anyhow::Error),

    /// The model kept requesting tools past the ceiling and produced no
    /// usable text on the forced final call.
    #[error("tool loop ceiling of {limit} rounds exceeded without a final answer")]
    LoopCeiling { limit: usize },
}

/// Tool-orchestrating conversation host.
///
/// Owns the thread for the duration of a turn: no other component writes to
/// the transcript while a resolution loop runs.
#[derive(Clone)]
pub struct Host {
    registry: Arc<ServerRegistry>,
    driver: Arc<dyn LlmDriver>,
    max_tool_rounds: usize,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("registry", &self.registry)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

impl Host {
    /// Create a host over a registry, a driver, and a tool-round ceiling.
    #[must_use]
    pub fn new(
        registry: Arc<ServerRegistry>,
        driver: Arc<dyn LlmDriver>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            registry,
            driver,
            max_tool_rounds,
        }
    }

    /// The registry backing this host.
    #[must_use]
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    /// Append a user utterance and resolve the turn to a final answer.
    pub async fn send_user_message(
        &self,
        thread: &mut ChatThread,
        text: &str,
    ) -> Result<String, HostError> {
        thread.push_user(text);
        self.resolve(thread).await
    }

    /// Resolve a prompt invocation and feed the rendered text through the
    /// loop exactly as if the user had typed it.
    ///
    /// A prompt name no connection advertises fails with
    /// [`McpError::PromptNotFound`], propagated to the caller.
    pub async fn run_prompt(
        &self,
        thread: &mut ChatThread,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<String, HostError> {
        let payload = self.registry.get_prompt(name, arguments).await?;
        if let Some(tag) = payload.treatment() {
            tracing::info!(prompt = name, treatment = tag, "recording treatment tag");
            thread.set_treatment(tag);
        }
        self.send_user_message(thread, &payload.text).await
    }

    /// The bounded resolution loop.
    async fn resolve(&self, thread: &mut ChatThread) -> Result<String, HostError> {
        let tools = self.registry.openai_tools_json();
        let mut rounds = 0usize;

        loop {
            let reply = self.query_model(thread, tools.clone()).await?;

            if reply.tool_calls.is_empty() {
                let text = reply.message.unwrap_or_default();
                thread.push_assistant(&text);
                tracing::info!(rounds, "turn resolved");
                return Ok(text);
            }

            if rounds >= self.max_tool_rounds {
                return self.force_final_answer(thread, tools).await;
            }

            tracing::info!(
                round = rounds,
                tool_call_count = reply.tool_calls.len(),
                "dispatching tool calls"
            );
            for call in &reply.tool_calls {
                self.dispatch_tool_call(thread, call).await;
            }
            rounds += 1;
        }
    }

    /// Ceiling handling: inject a synthetic tool note and honor exactly one
    /// more model call, surfacing a best-effort answer if it carries text.
    async fn force_final_answer(
        &self,
        thread: &mut ChatThread,
        tools: Vec<serde_json::Value>,
    ) -> Result<String, HostError> {
        tracing::warn!(
            limit = self.max_tool_rounds,
            "tool loop ceiling reached, forcing a final answer"
        );
        thread.push_tool_note(
            "Tool-call limit reached; no further tools will be executed. \
             Answer with the information gathered so far.",
        );

        let reply = self.query_model(thread, tools).await?;
        if !reply.tool_calls.is_empty() {
            tracing::warn!(
                ignored = reply.tool_calls.len(),
                "model requested tools past the ceiling, ignoring"
            );
        }
        match reply.message {
            Some(text) if !text.is_empty() => {
                thread.push_assistant(&text);
                Ok(text)
            }
            _ => Err(HostError::LoopCeiling {
                limit: self.max_tool_rounds,
            }),
        }
    }

    async fn query_model(
        &self,
        thread: &mut ChatThread,
        tools: Vec<serde_json::Value>,
    ) -> Result<LlmReply, HostError> {
        let metadata = thread
            .treatment()
            .map(|tag| serde_json::json!({"treatment": tag}));
        let req = LlmRequest {
            messages: thread.snapshot_json(),
            tools,
            session_id: thread.session_id().map(ToString::to_string),
            metadata,
        };
        let reply = self.driver.complete(req).await.map_err(HostError::Model)?;

        // Session identity is adopted from the first response and echoed
        // unchanged afterwards.
        if thread.session_id().is_none() {
            if let Some(sid) = &reply.session_id {
                thread.set_session_id(sid);
            }
        }
        Ok(reply)
    }

    /// Execute one requested call and record the outcome on the transcript.
    ///
    /// A failed call never aborts the turn: resolution failures and
    /// execution faults become correlated `tool` error messages the model
    /// sees on its next round. Only a successful execution appends the
    /// assistant call-announcement alongside the result.
    async fn dispatch_tool_call(&self, thread: &mut ChatThread, call: &ToolCall) {
        let name = &call.function.name;
        let arguments: serde_json::Value = serde_json::from_str(&call.function.arguments)
            .unwrap_or_else(|_| serde_json::json!({}));

        tracing::info!(tool = %name, call_id = %call.id, "executing tool call");
        match self.registry.call_tool(name, arguments).await {
            Ok(outcome) => {
                thread.push_assistant_call(call.clone());
                let content = if outcome.is_error {
                    format!("Error: {}", outcome.text)
                } else {
                    outcome.text
                };
                thread.push_tool_result(&call.id, content);
            }
            Err(e @ McpError::ToolNotFound(_)) => {
                tracing::warn!(tool = %name, call_id = %call.id, error = %e, "tool resolution failed");
                thread.push_tool_result(&call.id, format!("Error: {e}"));
            }
            Err(e) => {
                tracing::error!(tool = %name, call_id = %call.id, error = %e, "tool execution failed");
                thread.push_tool_result(&call.id, format!("Error executing tool {name}: {e}"));
            }
        }
    }
}
