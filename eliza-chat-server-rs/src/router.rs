use crate::handlers::{self, AppState};
use crate::{chat_session, dm_channel, proxy, realtime};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Chat sessions
        .route("/api/chat-session/create", post(chat_session::create))
        .route("/api/chat-sessions", get(chat_session::list))
        // DM channels
        .route("/api/dm-channel/create", post(dm_channel::create))
        .route("/api/dm-channel/get-or-create", post(dm_channel::get_or_create))
        .route("/api/dm-channel/list", get(dm_channel::list))
        // Agent server passthrough
        .route(
            "/api/eliza/{*path}",
            get(proxy::forward)
                .post(proxy::forward)
                .put(proxy::forward)
                .delete(proxy::forward)
                .options(proxy::preflight),
        )
        .route("/api/realtime/{channel_id}", get(realtime::connect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
