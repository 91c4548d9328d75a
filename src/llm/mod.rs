//! Model invocation seam and conversation message types.
//!
//! The [`LlmDriver`] trait is the single contract the host has with the
//! reasoning engine: a transcript plus a tool catalog in, one parsed reply
//! out. [`ChatCompletionsDriver`] implements it against the OpenAI Chat
//! Completions API; tests substitute scripted drivers.

pub mod chat_completions;
pub mod host;

pub use chat_completions::ChatCompletionsDriver;
pub use host::{Host, HostError};

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4.1-nano`).
    pub model: String,
}

/// A message in a conversation, in Chat Completions wire shape.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content of the message.
    pub content: String,
    /// Correlation id linking a tool result to the call it answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Pending tool calls announced by the assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
    /// Tool response.
    Tool,
}

/// A tool call requested by the assistant.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    /// Unique identifier correlating the call to its eventual result.
    pub id: String,
    /// Type of tool (always "function" for now).
    #[serde(rename = "type")]
    pub call_type: String,
    /// Function details.
    pub function: ToolCallFunction,
}

/// Function details in a tool call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCallFunction {
    /// Function name.
    pub name: String,
    /// Arguments as JSON string.
    pub arguments: String,
}

/// Request to an LLM driver.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Conversation messages, serialized transcript snapshot.
    pub messages: Vec<serde_json::Value>,
    /// Available tools in OpenAI function schema format.
    pub tools: Vec<serde_json::Value>,
    /// Session identifier threaded through successive calls, if established.
    pub session_id: Option<String>,
    /// Extra request metadata (treatment tag bookkeeping).
    pub metadata: Option<serde_json::Value>,
}

/// One parsed model reply.
#[derive(Debug, Clone, Default)]
pub struct LlmReply {
    /// Final or interim assistant text, if any.
    pub message: Option<String>,
    /// Tool calls the model wants executed, in emission order.
    pub tool_calls: Vec<ToolCall>,
    /// Session identifier to echo on subsequent calls.
    pub session_id: Option<String>,
}

/// Trait for model invocation endpoints.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Send the transcript and tool catalog, return the parsed reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be
    /// parsed.
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<LlmReply>;
}
