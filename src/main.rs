//! MCP tool-orchestration host, REPL entry point.
//!
//! Registers the servers listed in `mcp.json`, then reads user messages from
//! stdin and prints the final assistant answer for each turn. A line of the
//! form `/prompt <name> [json-args]` invokes prompt resolution instead.

use std::io::{BufRead, Write};
use std::sync::Arc;

use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_host::config::{AppConfig, load_llm_settings};
use mcp_host::llm::{ChatCompletionsDriver, Host};
use mcp_host::mcp::config::load_mcp_config;
use mcp_host::mcp::registry::ServerRegistry;
use mcp_host::session::ChatThread;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // Load .env (if present)
    let _ = dotenv();

    let cfg = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let settings = match load_llm_settings() {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Configuration error: {msg}");
            std::process::exit(1);
        }
    };

    info!(
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM settings loaded"
    );

    let registry = match load_mcp_config(&cfg.chat.mcp_config) {
        Ok(mcp_cfg) => ServerRegistry::from_config(&mcp_cfg).await,
        Err(e) => {
            tracing::warn!(
                path = %cfg.chat.mcp_config,
                error = %e,
                "no MCP config loaded, starting with an empty catalog"
            );
            ServerRegistry::new()
        }
    };

    info!(
        server_count = registry.connections().len(),
        tool_count = registry.tools().len(),
        prompt_count = registry.prompts().len(),
        "capability catalog ready"
    );

    let host = Host::new(
        Arc::new(registry),
        Arc::new(ChatCompletionsDriver::new(settings)),
        cfg.chat.max_tool_rounds,
    );
    let mut thread = ChatThread::new();

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("stdin error: {e}");
                break;
            }
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = if let Some(rest) = line.strip_prefix("/prompt ") {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or_default().to_string();
            let arguments = parts
                .next()
                .and_then(|raw| serde_json::from_str(raw.trim()).ok());
            host.run_prompt(&mut thread, &name, arguments).await
        } else {
            host.send_user_message(&mut thread, line).await
        };

        match result {
            Ok(answer) => println!("{answer}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }
}
