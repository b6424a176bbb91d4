use crate::handlers::AppState;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (
        header::ACCESS_CONTROL_ALLOW_METHODS,
        "GET, POST, PUT, DELETE, OPTIONS",
    ),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "Content-Type, Authorization, X-API-KEY",
    ),
];

/// Relays `/api/eliza/{path}` to `{agent server}/api/{path}`.
pub async fn forward(
    State(state): State<Arc<AppState>>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    body: String,
) -> Response {
    let body = match method {
        Method::POST | Method::PUT => Some(body),
        _ => None,
    };

    match state
        .messaging
        .forward(method, &path, query.as_deref(), body)
        .await
    {
        Ok((status, value)) => (status, CORS_HEADERS, Json(value)).into_response(),
        Err(e) => {
            tracing::error!(%path, error = %e, "[Proxy] request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to connect to ElizaOS server" })),
            )
                .into_response()
        }
    }
}

pub async fn preflight() -> impl IntoResponse {
    (StatusCode::OK, CORS_HEADERS)
}
