use std::env;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the ElizaOS agent server.
    pub eliza_server_url: String,
    /// Agent that chat sessions are opened with. Session routes fail with
    /// 500 when this is unset.
    pub agent_id: Option<String>,
    pub bind_addr: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            eliza_server_url: non_empty("ELIZA_SERVER_URL")
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            agent_id: non_empty("ELIZA_AGENT_ID"),
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
