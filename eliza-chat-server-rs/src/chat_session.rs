use crate::dm_channel::{get_or_create_dm_channel, present, DmChannelRequest};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{json_body, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use eliza_sdk_rs::models::CENTRAL_SERVER_ID;
use eliza_sdk_rs::session::{build_session, is_session_channel, sort_by_last_activity};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Messages fetched per session when building the list.
const SESSION_MESSAGE_LIMIT: usize = 50;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: Option<String>,
    pub initial_message: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsParams {
    pub user_id: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let req = json_body(body)?;
    let user_id =
        present(req.user_id).ok_or_else(|| ApiError::bad_request("userId is required"))?;
    let agent_id = state.agent_id()?.to_string();

    let session_id = Uuid::new_v4().to_string();
    tracing::info!(%session_id, %user_id, "creating chat session");

    let (channel, _) = get_or_create_dm_channel(
        &state,
        DmChannelRequest {
            user_id: user_id.clone(),
            agent_id: agent_id.clone(),
            session_id: Some(session_id.clone()),
            initial_message: req.initial_message.clone(),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| match e {
        ApiError::Upstream { details, .. } => ApiError::Upstream {
            message: "Failed to create chat session".to_string(),
            details,
        },
        other => other,
    })?;

    let channel_id = channel
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ApiError::upstream(
                "Failed to create chat session",
                "No channel ID returned from DM channel creation",
            )
        })?
        .to_string();

    tracing::info!(%channel_id, %session_id, "created DM channel for session");
    Ok(Json(json!({
        "success": true,
        "data": {
            "sessionId": session_id,
            "channelId": channel_id,
            "userId": user_id,
            "agentId": agent_id,
            "initialMessage": req.initial_message,
            "createdAt": Utc::now().to_rfc3339(),
        }
    })))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSessionsParams>,
) -> ApiResult<Json<Value>> {
    let user_id = present(params.user_id)
        .ok_or_else(|| ApiError::bad_request("userId parameter is required"))?;
    let agent_id = state.agent_id()?;

    let channels = state
        .messaging
        .list_server_channels(CENTRAL_SERVER_ID)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch chat sessions", e))?;
    tracing::info!(total = channels.len(), "fetched channels");

    let session_channels: Vec<_> = channels
        .into_iter()
        .filter(|c| is_session_channel(c, &user_id, agent_id))
        .collect();
    tracing::info!(
        count = session_channels.len(),
        %user_id,
        %agent_id,
        "found session channels"
    );

    let messaging = &state.messaging;
    let user = user_id.as_str();
    let mut sessions = join_all(session_channels.iter().map(|channel| async move {
        let messages = match messaging
            .channel_messages(&channel.id, SESSION_MESSAGE_LIMIT)
            .await
        {
            Ok(messages) => Some(messages),
            Err(e) => {
                tracing::error!(channel_id = %channel.id, error = %e, "failed to fetch messages");
                None
            }
        };
        build_session(channel, messages, user, agent_id)
    }))
    .await;
    sort_by_last_activity(&mut sessions);

    Ok(Json(json!({
        "success": true,
        "data": {
            "userId": user_id,
            "totalSessions": sessions.len(),
            "sessions": sessions,
        }
    })))
}
