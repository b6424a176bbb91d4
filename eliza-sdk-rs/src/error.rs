use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElizaError {
    #[error("request to agent server failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent server responded with status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("socket error: {0}")]
    Socket(String),

    #[error("socket not initialized")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ElizaError>;
