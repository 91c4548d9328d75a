//! Conversation thread: the canonical transcript and session identity.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::llm::{Message, MessageRole, ToolCall};

/// The ordered transcript for one conversation, plus the session identity
/// threaded through successive model calls.
///
/// Append-only and single-writer: the resolution loop owns the thread for
/// the duration of a turn, so mutation goes through plain `&mut` methods and
/// there is nothing to lock.
#[derive(Debug, Clone)]
pub struct ChatThread {
    /// Local thread identifier (not the model-side session id).
    id: String,
    messages: Vec<Message>,
    /// Model-side session identifier, set on the first response and echoed
    /// on every subsequent call.
    session_id: Option<String>,
    /// Experiment/treatment tag attached via prompt resolution.
    treatment: Option<String>,
    created_at: DateTime<Utc>,
}

impl Default for ChatThread {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatThread {
    /// Create an empty thread with a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            session_id: None,
            treatment: None,
            created_at: Utc::now(),
        }
    }

    /// Local thread identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Thread creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message {
            role: MessageRole::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        });
    }

    /// Append a final assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        });
    }

    /// Append the assistant's announcement of one pending tool call.
    pub fn push_assistant_call(&mut self, call: ToolCall) {
        self.messages.push(Message {
            role: MessageRole::Assistant,
            content: String::new(),
            tool_call_id: None,
            tool_calls: Some(vec![call]),
        });
    }

    /// Append a tool result correlated to the call it answers.
    pub fn push_tool_result(&mut self, call_id: impl Into<String>, content: impl Into<String>) {
        self.messages.push(Message {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
        });
    }

    /// Append a synthetic tool note with no real call behind it (the loop
    /// uses this for the ceiling-exceeded notice).
    pub fn push_tool_note(&mut self, content: impl Into<String>) {
        self.messages.push(Message {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some("loop-ceiling".to_string()),
            tool_calls: None,
        });
    }

    /// The transcript in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// The transcript serialized for transmission to the model.
    #[must_use]
    pub fn snapshot_json(&self) -> Vec<serde_json::Value> {
        self.messages
            .iter()
            .map(|m| serde_json::to_value(m).unwrap_or_default())
            .collect()
    }

    /// Number of messages in the transcript.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Model-side session identifier, if established.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Record the model-side session identifier.
    pub fn set_session_id(&mut self, id: impl Into<String>) {
        self.session_id = Some(id.into());
    }

    /// Treatment tag recorded for this session, if any.
    #[must_use]
    pub fn treatment(&self) -> Option<&str> {
        self.treatment.as_deref()
    }

    /// Record a treatment tag for downstream observability.
    pub fn set_treatment(&mut self, tag: impl Into<String>) {
        self.treatment = Some(tag.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCallFunction;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: ToolCallFunction {
                name: name.to_string(),
                arguments: "{}".to_string(),
            },
        }
    }

    #[test]
    fn fresh_thread_has_identity_but_no_session() {
        let before = chrono::Utc::now();
        let thread = ChatThread::new();

        assert!(!thread.id().is_empty());
        assert!(thread.created_at() >= before);
        assert!(thread.is_empty());
        assert!(thread.session_id().is_none());

        // Thread ids are local and unique, unlike the model-side session id.
        assert_ne!(thread.id(), ChatThread::new().id());
    }

    #[test]
    fn transcript_preserves_insertion_order() {
        let mut thread = ChatThread::new();
        thread.push_user("show only done items");
        thread.push_assistant_call(call("c1", "set-filter"));
        thread.push_tool_result("c1", "filter set");
        thread.push_assistant("Done.");

        let roles: Vec<MessageRole> = thread.snapshot().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant,
            ]
        );
        assert_eq!(thread.snapshot()[2].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn snapshot_is_idempotent_without_intervening_appends() {
        let mut thread = ChatThread::new();
        thread.push_user("hello");
        thread.push_assistant("hi");

        assert_eq!(thread.snapshot_json(), thread.snapshot_json());
    }

    #[test]
    fn session_identity_and_treatment() {
        let mut thread = ChatThread::new();
        assert!(thread.session_id().is_none());

        thread.set_session_id("chatcmpl-123");
        thread.set_treatment("variant-b");
        assert_eq!(thread.session_id(), Some("chatcmpl-123"));
        assert_eq!(thread.treatment(), Some("variant-b"));
    }

    #[test]
    fn tool_messages_serialize_with_correlation_id() {
        let mut thread = ChatThread::new();
        thread.push_tool_result("c9", "ok");

        let json = thread.snapshot_json();
        assert_eq!(json[0]["role"], "tool");
        assert_eq!(json[0]["tool_call_id"], "c9");
        // Absent fields are omitted from the wire form entirely.
        assert!(json[0].get("tool_calls").is_none());
    }
}
