//! Wire-neutral capability types shared by both connection kinds.
//!
//! Remote servers answer through `rmcp`; embedded servers answer through the
//! paired channel. Both surfaces are folded into the serde shapes below, using
//! the MCP wire names (`inputSchema`, `isError`, `nextCursor`) so that rmcp
//! results can be converted through their JSON form without depending on the
//! protocol library's concrete types.

use serde::{Deserialize, Serialize};

/// A tool advertised by a server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Structural description of the expected arguments (JSON schema object).
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

/// A named argument accepted by a parameterized prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
}

/// A prompt advertised by a server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Option<Vec<PromptArgument>>,
}

impl PromptDescriptor {
    /// Whether the prompt declares any arguments.
    ///
    /// Presentation-level classification only; routing treats all prompts
    /// uniformly.
    #[must_use]
    pub fn takes_arguments(&self) -> bool {
        self.arguments.as_ref().is_some_and(|args| !args.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    pub prompts: Vec<PromptDescriptor>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

/// Raw `tools/call` result as it crosses the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
    #[serde(rename = "isError", default)]
    pub is_error: Option<bool>,
}

/// What the loop sees after a tool call: the result text and whether the
/// provider reported a domain-level failure (distinct from a transport fault,
/// which surfaces as an `Err` from the handle instead).
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub is_error: bool,
    pub text: String,
}

impl From<CallToolResult> for ToolOutcome {
    fn from(res: CallToolResult) -> Self {
        let text = res
            .content
            .iter()
            .find_map(|c| c.get("text").and_then(|t| t.as_str()))
            .map_or_else(
                || serde_json::to_string(&res.content).unwrap_or_default(),
                ToString::to_string,
            );
        Self {
            is_error: res.is_error.unwrap_or(false),
            text,
        }
    }
}

/// Raw `prompts/get` result as it crosses the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    #[serde(default)]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
    #[serde(rename = "_meta", default)]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    #[serde(default)]
    pub role: Option<String>,
    pub content: serde_json::Value,
}

/// A rendered prompt: the utterance text to feed into the loop plus any
/// metadata the server attached (experiment/treatment tags live here).
#[derive(Debug, Clone)]
pub struct PromptPayload {
    pub text: String,
    pub meta: Option<serde_json::Value>,
}

impl From<GetPromptResult> for PromptPayload {
    fn from(res: GetPromptResult) -> Self {
        let text = res
            .messages
            .first()
            .and_then(|m| m.content.get("text"))
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        Self {
            text,
            meta: res.meta,
        }
    }
}

impl PromptPayload {
    /// Treatment tag embedded in the response metadata, if any.
    #[must_use]
    pub fn treatment(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|m| m.get("treatment"))
            .and_then(|t| t.as_str())
    }
}
