//! End-to-end resolution loop scenarios with a scripted model driver.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use mcp_host::llm::{
    Host, HostError, LlmDriver, LlmReply, LlmRequest, MessageRole, ToolCall, ToolCallFunction,
};
use mcp_host::mcp::embedded::ToolServer;
use mcp_host::mcp::error::McpError;
use mcp_host::mcp::registry::ServerRegistry;
use mcp_host::mcp::types::PromptPayload;
use mcp_host::session::ChatThread;

/// Driver that replays a fixed list of replies and records every request.
struct ScriptedDriver {
    replies: Mutex<VecDeque<LlmReply>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedDriver {
    fn new(replies: Vec<LlmReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, idx: usize) -> LlmRequest {
        self.requests.lock().unwrap()[idx].clone()
    }
}

#[async_trait::async_trait]
impl LlmDriver for ScriptedDriver {
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<LlmReply> {
        self.requests.lock().unwrap().push(req);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted driver exhausted"))
    }
}

/// Driver that wants tools on every single round, forever.
struct LoopingDriver {
    calls: Mutex<usize>,
}

#[async_trait::async_trait]
impl LlmDriver for LoopingDriver {
    async fn complete(&self, _req: LlmRequest) -> anyhow::Result<LlmReply> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Ok(LlmReply {
            message: None,
            tool_calls: vec![tool_call(&format!("c{calls}"), "set-todo-status-filter")],
            session_id: None,
        })
    }
}

fn tool_call(id: &str, name: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        call_type: "function".to_string(),
        function: ToolCallFunction {
            name: name.to_string(),
            arguments: r#"{"filter": "completed"}"#.to_string(),
        },
    }
}

fn text_reply(text: &str) -> LlmReply {
    LlmReply {
        message: Some(text.to_string()),
        tool_calls: Vec::new(),
        session_id: None,
    }
}

fn tool_reply(calls: Vec<ToolCall>) -> LlmReply {
    LlmReply {
        message: None,
        tool_calls: calls,
        session_id: None,
    }
}

async fn widget_registry() -> Arc<ServerRegistry> {
    let server = ToolServer::new("todo-widget")
        .tool(
            "set-todo-status-filter",
            "Sets the status filter for the rendered todo list",
            serde_json::json!({
                "type": "object",
                "properties": {"filter": {"type": "string"}},
                "required": ["filter"]
            }),
            |args| {
                let filter = args
                    .get("filter")
                    .and_then(|f| f.as_str())
                    .ok_or("missing filter")?;
                Ok(format!("Todo status filter set to {filter}"))
            },
        )
        .prompt("focus-done", None, |_| PromptPayload {
            text: "show only done items".into(),
            meta: Some(serde_json::json!({"treatment": "variant-b"})),
        });

    let mut registry = ServerRegistry::new();
    registry.register_embedded_server(&server).await;
    Arc::new(registry)
}

fn host(registry: Arc<ServerRegistry>, driver: Arc<dyn LlmDriver>, rounds: usize) -> Host {
    Host::new(registry, driver, rounds)
}

#[tokio::test]
async fn plain_reply_terminates_in_one_round() {
    let driver = ScriptedDriver::new(vec![text_reply("Hello!")]);
    let host = host(widget_registry().await, driver.clone(), 10);
    let mut thread = ChatThread::new();

    let answer = host.send_user_message(&mut thread, "hi").await.unwrap();

    assert_eq!(answer, "Hello!");
    assert_eq!(driver.request_count(), 1);
    // Exactly one user and one assistant message.
    assert_eq!(thread.len(), 2);
    assert_eq!(thread.snapshot()[1].role, MessageRole::Assistant);
    // The catalog the model saw is the registry's.
    assert_eq!(host.registry().tools().len(), 1);
    assert_eq!(driver.request(0).tools.len(), 1);
}

#[tokio::test]
async fn end_to_end_set_filter_scenario() {
    let mut scripted_call = tool_reply(vec![tool_call("call-1", "set-todo-status-filter")]);
    scripted_call.session_id = Some("sess-1".to_string());
    let driver = ScriptedDriver::new(vec![scripted_call, text_reply("Done.")]);
    let host = host(widget_registry().await, driver.clone(), 10);
    let mut thread = ChatThread::new();

    let answer = host
        .send_user_message(&mut thread, "show only done items")
        .await
        .unwrap();

    assert_eq!(answer, "Done.");
    // user, assistant-call, tool-result, assistant-final.
    assert_eq!(thread.len(), 4);
    let transcript = thread.snapshot();
    assert_eq!(transcript[0].role, MessageRole::User);
    assert_eq!(transcript[1].role, MessageRole::Assistant);
    assert_eq!(
        transcript[1].tool_calls.as_ref().map(Vec::len),
        Some(1)
    );
    assert_eq!(transcript[2].role, MessageRole::Tool);
    assert_eq!(transcript[2].tool_call_id.as_deref(), Some("call-1"));
    assert_eq!(transcript[2].content, "Todo status filter set to completed");
    assert_eq!(transcript[3].content, "Done.");

    // Session identity adopted from the first reply and echoed afterwards.
    assert_eq!(thread.session_id(), Some("sess-1"));
    assert_eq!(driver.request(0).session_id, None);
    assert_eq!(driver.request(1).session_id.as_deref(), Some("sess-1"));
}

#[tokio::test]
async fn k_successful_calls_append_2k_entries_before_requery() {
    let calls = vec![
        tool_call("c1", "set-todo-status-filter"),
        tool_call("c2", "set-todo-status-filter"),
        tool_call("c3", "set-todo-status-filter"),
    ];
    let driver = ScriptedDriver::new(vec![tool_reply(calls), text_reply("ok")]);
    let host = host(widget_registry().await, driver.clone(), 10);
    let mut thread = ChatThread::new();

    host.send_user_message(&mut thread, "go").await.unwrap();

    // user + (announcement + result) * 3 + final assistant.
    assert_eq!(thread.len(), 8);
    // The second model request saw all 7 prior entries.
    assert_eq!(driver.request(1).messages.len(), 7);
}

#[tokio::test]
async fn unresolvable_tool_becomes_error_context() {
    let driver = ScriptedDriver::new(vec![
        tool_reply(vec![tool_call("c1", "not-a-registered-tool")]),
        text_reply("ok"),
    ]);
    let host = host(widget_registry().await, driver.clone(), 10);
    let mut thread = ChatThread::new();

    let answer = host.send_user_message(&mut thread, "go").await.unwrap();

    // The failed resolution did not abort the turn.
    assert_eq!(answer, "ok");
    // user, tool-error (no announcement), assistant-final.
    assert_eq!(thread.len(), 3);
    let error_msg = &thread.snapshot()[1];
    assert_eq!(error_msg.role, MessageRole::Tool);
    assert_eq!(error_msg.tool_call_id.as_deref(), Some("c1"));
    assert!(error_msg.content.contains("no registered server advertises tool"));
}

#[tokio::test]
async fn domain_failure_is_error_tagged_but_announced() {
    // Missing "filter" makes the widget handler report a domain error.
    let mut bad_call = tool_call("c1", "set-todo-status-filter");
    bad_call.function.arguments = "{}".to_string();
    let driver = ScriptedDriver::new(vec![tool_reply(vec![bad_call]), text_reply("ok")]);
    let host = host(widget_registry().await, driver.clone(), 10);
    let mut thread = ChatThread::new();

    host.send_user_message(&mut thread, "go").await.unwrap();

    // Announcement + error-tagged result: the call executed, the provider
    // reported the failure.
    assert_eq!(thread.len(), 4);
    let result = &thread.snapshot()[2];
    assert_eq!(result.role, MessageRole::Tool);
    assert_eq!(result.content, "Error: missing filter");
}

#[tokio::test]
async fn ceiling_aborts_a_model_that_never_converges() {
    let driver = Arc::new(LoopingDriver {
        calls: Mutex::new(0),
    });
    let host = host(widget_registry().await, driver.clone(), 2);
    let mut thread = ChatThread::new();

    let err = host.send_user_message(&mut thread, "go").await.unwrap_err();

    assert!(matches!(err, HostError::LoopCeiling { limit: 2 }));
    // Initial call + 2 tool rounds + the forced final call.
    assert_eq!(*driver.calls.lock().unwrap(), 4);
    // The synthetic ceiling notice is the last transcript entry.
    let last = thread.snapshot().last().unwrap();
    assert_eq!(last.role, MessageRole::Tool);
    assert!(last.content.contains("Tool-call limit reached"));
}

#[tokio::test]
async fn ceiling_surfaces_a_best_effort_answer() {
    let driver = ScriptedDriver::new(vec![
        tool_reply(vec![tool_call("c1", "set-todo-status-filter")]),
        tool_reply(vec![tool_call("c2", "set-todo-status-filter")]),
        // Forced final call: still wants tools, but carries text.
        LlmReply {
            message: Some("Best effort: filter applied twice.".to_string()),
            tool_calls: vec![tool_call("c3", "set-todo-status-filter")],
            session_id: None,
        },
    ]);
    let host = host(widget_registry().await, driver.clone(), 1);
    let mut thread = ChatThread::new();

    let answer = host.send_user_message(&mut thread, "go").await.unwrap();

    assert_eq!(answer, "Best effort: filter applied twice.");
    // The ignored tool requests from the final reply left no trace after
    // the final assistant text.
    let last = thread.snapshot().last().unwrap();
    assert_eq!(last.role, MessageRole::Assistant);
    assert_eq!(last.content, "Best effort: filter applied twice.");
}

#[tokio::test]
async fn prompt_resolution_feeds_the_loop() {
    let driver = ScriptedDriver::new(vec![text_reply("Showing done items.")]);
    let host = host(widget_registry().await, driver.clone(), 10);
    let mut thread = ChatThread::new();

    let answer = host.run_prompt(&mut thread, "focus-done", None).await.unwrap();

    assert_eq!(answer, "Showing done items.");
    // The rendered prompt text entered the transcript as a user message.
    assert_eq!(thread.snapshot()[0].role, MessageRole::User);
    assert_eq!(thread.snapshot()[0].content, "show only done items");
    // Treatment tag recorded and forwarded as model-call metadata.
    assert_eq!(thread.treatment(), Some("variant-b"));
    assert_eq!(
        driver.request(0).metadata,
        Some(serde_json::json!({"treatment": "variant-b"}))
    );
}

#[tokio::test]
async fn unknown_prompt_propagates_not_found() {
    let driver = ScriptedDriver::new(Vec::new());
    let host = host(widget_registry().await, driver.clone(), 10);
    let mut thread = ChatThread::new();

    let err = host
        .run_prompt(&mut thread, "no-such-prompt", None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HostError::Mcp(McpError::PromptNotFound(_))
    ));
    // The failed invocation left the transcript untouched.
    assert!(thread.is_empty());
    assert_eq!(driver.request_count(), 0);
}
