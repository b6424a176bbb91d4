mod chat_session;
mod config;
mod dm_channel;
mod error;
mod handlers;
mod proxy;
mod realtime;
mod router;


use crate::config::ServerConfig;
use crate::handlers::AppState;
use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    eliza_sdk_rs::logger::init_logging("info,tower_http=debug");

    let config = ServerConfig::from_env();
    tracing::info!(server = %config.eliza_server_url, "agent server");
    match &config.agent_id {
        Some(agent_id) => tracing::info!(%agent_id, "agent configured"),
        None => tracing::warn!("ELIZA_AGENT_ID is not set; session routes will fail"),
    }

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config));
    let app = router::build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
