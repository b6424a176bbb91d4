use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use axum::Json;
use eliza_sdk_rs::MessagingClient;

pub struct AppState {
    pub config: ServerConfig,
    pub messaging: MessagingClient,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let messaging = MessagingClient::new(config.eliza_server_url.clone());
        Self { config, messaging }
    }

    /// The configured agent id, or the 500 the session routes answer without one.
    pub fn agent_id(&self) -> ApiResult<&str> {
        self.config
            .agent_id
            .as_deref()
            .ok_or_else(|| ApiError::Config("Agent ID not configured".to_string()))
    }
}

/// Reads a JSON request body. A body sent without a JSON content type is
/// treated as empty so the route reports its own missing-field error.
pub fn json_body<T: Default>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
