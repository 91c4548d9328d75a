use crate::llm::LlmSettings;
use crate::llm::host::DEFAULT_MAX_TOOL_ROUNDS;
use clap::Parser;
use config::{Config, Environment};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the MCP server list
    #[arg(long, env = "MCP_CONFIG")]
    pub mcp_config: Option<String>,

    /// Ceiling on extra tool rounds per user turn
    #[arg(long, env = "MAX_TOOL_ROUNDS")]
    pub max_tool_rounds: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Ceiling on extra tool rounds per user turn.
    pub max_tool_rounds: usize,
    /// Path to the `mcp.json` server list.
    pub mcp_config: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("chat.max_tool_rounds", DEFAULT_MAX_TOOL_ROUNDS as u64)?
            .set_default("chat.mcp_config", "mcp.json")?;

        // CLI flags (and their clap-declared env vars) win over everything.
        if let Some(path) = cli.mcp_config {
            builder = builder.set_override("chat.mcp_config", path)?;
        }
        if let Some(rounds) = cli.max_tool_rounds {
            builder = builder.set_override("chat.max_tool_rounds", rounds)?;
        }

        // Environment variables prefixed with HOST_, e.g. HOST_CHAT__MAX_TOOL_ROUNDS=5.
        builder = builder.add_source(
            Environment::with_prefix("HOST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

pub fn load_llm_settings() -> Result<LlmSettings, String> {
    let base_url = std::env::var("LLM_BASE_URL")
        .map_err(|_| "Missing required env var: LLM_BASE_URL".to_string())?;
    if base_url.trim().is_empty() {
        return Err("LLM_BASE_URL cannot be empty".to_string());
    }

    let model = std::env::var("LLM_MODEL")
        .map_err(|_| "Missing required env var: LLM_MODEL".to_string())?;
    if model.trim().is_empty() {
        return Err("LLM_MODEL cannot be empty".to_string());
    }

    let api_key = std::env::var("LLM_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());

    Ok(LlmSettings {
        base_url,
        api_key,
        model,
    })
}
