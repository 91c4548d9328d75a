use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

/// Remote server list, loaded from `mcp.json`.
///
/// Embedded servers are constructed in code and never appear here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct McpConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: HashMap<String, McpServerEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct McpServerEntry {
    pub url: String,
}

pub fn load_mcp_config(path: impl AsRef<Path>) -> anyhow::Result<McpConfig> {
    let txt = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&txt)?)
}

/// Expand "${VAR}" placeholders from the process environment.
/// - If env var is missing, leaves the placeholder unchanged.
pub fn expand_env_placeholders(input: &str) -> String {
    let mut out = input.to_string();
    // naive scan; good enough for config values
    for (k, v) in std::env::vars() {
        let needle = format!("${{{k}}}");
        if out.contains(&needle) {
            out = out.replace(&needle, &v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_list() {
        let cfg: McpConfig = serde_json::from_str(
            r#"{"mcpServers": {"todo-server": {"url": "http://localhost:5000/mcp"}}}"#,
        )
        .unwrap();
        assert_eq!(
            cfg.mcp_servers["todo-server"].url,
            "http://localhost:5000/mcp"
        );
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        assert_eq!(
            expand_env_placeholders("http://host/${DEFINITELY_NOT_SET_ANYWHERE}"),
            "http://host/${DEFINITELY_NOT_SET_ANYWHERE}"
        );
    }
}
