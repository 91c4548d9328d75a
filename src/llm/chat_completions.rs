//! OpenAI Chat Completions API driver.
//!
//! Non-streaming: the host consumes whole replies, so one JSON body read per
//! round trip is all the loop needs.

use super::{LlmDriver, LlmReply, LlmRequest, LlmSettings, ToolCall};

/// Driver for the OpenAI Chat Completions API (`/v1/chat/completions`).
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<LlmReply> {
        let url = format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );

        let mut body = serde_json::json!({
            "model": self.settings.model,
            "messages": req.messages,
        });
        if !req.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(req.tools);
        }
        if let Some(metadata) = &req.metadata {
            body["metadata"] = metadata.clone();
        }

        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            session_id = ?req.session_id,
            "sending chat completion request"
        );

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb.send().await?.error_for_status()?;
        let v: serde_json::Value = resp.json().await?;

        let message = &v["choices"][0]["message"];
        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        let tool_calls: Vec<ToolCall> = message
            .get("tool_calls")
            .map(|tc| serde_json::from_value(tc.clone()))
            .transpose()?
            .unwrap_or_default();

        // The completion id doubles as session identity on the first turn;
        // afterwards the established id is echoed back unchanged.
        let session_id = req
            .session_id
            .or_else(|| v.get("id").and_then(|id| id.as_str()).map(ToString::to_string));

        tracing::debug!(
            has_text = text.is_some(),
            tool_call_count = tool_calls.len(),
            "parsed chat completion reply"
        );

        Ok(LlmReply {
            message: text,
            tool_calls,
            session_id,
        })
    }
}
