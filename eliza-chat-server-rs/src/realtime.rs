use crate::handlers::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use eliza_sdk_rs::models::CENTRAL_SERVER_ID;
use eliza_sdk_rs::{SocketConfig, SocketManager};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

const CLIENT_SOURCE: &str = "client_chat";

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeParams {
    pub entity_id: Option<String>,
    pub server_id: Option<String>,
}

/// Upgrades to a websocket bridged to the agent server for one channel.
pub async fn connect(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    Query(params): Query<RealtimeParams>,
) -> impl IntoResponse {
    let entity_id = params
        .entity_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let server_id = params
        .server_id
        .unwrap_or_else(|| CENTRAL_SERVER_ID.to_string());
    ws.on_upgrade(move |socket| bridge(socket, state, channel_id, entity_id, server_id))
}

async fn bridge(
    socket: WebSocket,
    state: Arc<AppState>,
    channel_id: String,
    entity_id: String,
    server_id: String,
) {
    let manager = Arc::new(SocketManager::new(entity_id.clone(), Some(server_id)));
    let mut events = manager.subscribe();
    manager
        .initialize(SocketConfig::new(state.config.eliza_server_url.clone()))
        .await;
    manager.set_active_session_channel_id(&channel_id).await;

    {
        let manager = manager.clone();
        let channel_id = channel_id.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.join_channel(&channel_id, None).await {
                tracing::warn!(%channel_id, error = %e, "failed to join channel");
            }
        });
    }

    tracing::info!(%channel_id, %entity_id, "realtime client connected");
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to serialize relay event"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "realtime client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().trim();
                    if text.is_empty() {
                        continue;
                    }
                    if let Err(e) = manager
                        .send_channel_message(text, &channel_id, CLIENT_SOURCE, Some(&channel_id), None)
                        .await
                    {
                        tracing::warn!(%channel_id, error = %e, "failed to send message");
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    manager.disconnect().await;
    tracing::info!(%channel_id, %entity_id, "realtime client disconnected");
}
