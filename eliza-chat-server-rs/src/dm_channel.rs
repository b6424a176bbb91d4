use crate::error::{ApiError, ApiResult};
use crate::handlers::{json_body, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{Local, Utc};
use eliza_sdk_rs::models::{
    ChannelMetadata, NewChannel, RawChannel, CENTRAL_SERVER_ID, DM_CHANNEL_TYPE,
};
use eliza_sdk_rs::session::{is_dm_channel_for, sort_by_metadata_created_at};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateDmRequest {
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub channel_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetOrCreateDmRequest {
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
    pub initial_message: Option<String>,
    pub title: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListDmParams {
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
}

/// Everything needed to open a DM channel upstream.
#[derive(Debug, Default)]
pub(crate) struct DmChannelRequest {
    pub user_id: String,
    pub agent_id: String,
    pub channel_id: Option<String>,
    pub title: Option<String>,
    pub session_id: Option<String>,
    pub initial_message: Option<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateDmRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let req = json_body(body)?;
    let (user_id, agent_id) = require_pair(req.user_id, req.agent_id)?;
    let channel = create_dm_channel(
        &state,
        DmChannelRequest {
            user_id,
            agent_id,
            channel_id: present(req.channel_id),
            title: present(req.title),
            ..Default::default()
        },
    )
    .await?;
    Ok(Json(json!({ "success": true, "channel": channel })))
}

pub async fn get_or_create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GetOrCreateDmRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let req = json_body(body)?;
    let (user_id, agent_id) = require_pair(req.user_id, req.agent_id)?;
    let (channel, created) = get_or_create_dm_channel(
        &state,
        DmChannelRequest {
            user_id,
            agent_id,
            title: present(req.title),
            session_id: present(req.session_id),
            initial_message: present(req.initial_message),
            ..Default::default()
        },
    )
    .await?;
    Ok(Json(
        json!({ "success": true, "channel": channel, "created": created }),
    ))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListDmParams>,
) -> ApiResult<Json<Value>> {
    let (user_id, agent_id) = require_pair(params.user_id, params.agent_id)?;

    let channels: Vec<Value> = dm_channels(&state, &user_id, &agent_id, None)
        .await?
        .into_iter()
        .map(|c| c.raw)
        .collect();

    tracing::info!(%user_id, %agent_id, count = channels.len(), "listed DM channels");
    Ok(Json(json!({
        "success": true,
        "count": channels.len(),
        "channels": channels,
    })))
}

/// DM channels between the pair as upstream sent them, newest first,
/// restricted to `session_id` when one is given.
async fn dm_channels(
    state: &AppState,
    user_id: &str,
    agent_id: &str,
    session_id: Option<&str>,
) -> ApiResult<Vec<RawChannel>> {
    let mut channels: Vec<RawChannel> = state
        .messaging
        .list_central_channels()
        .await
        .map_err(|e| ApiError::upstream("Failed to get channels", e))?
        .into_iter()
        .filter(|c| is_dm_channel_for(&c.channel, user_id, agent_id))
        .filter(|c| match session_id {
            Some(session) => c.channel.metadata.session_id.as_deref() == Some(session),
            None => true,
        })
        .collect();
    sort_by_metadata_created_at(&mut channels, |c| &c.channel);
    Ok(channels)
}

/// Returns the newest DM channel for the pair, restricted to `session_id`
/// when one is given, and creates one when nothing matches.
pub(crate) async fn get_or_create_dm_channel(
    state: &AppState,
    request: DmChannelRequest,
) -> ApiResult<(Value, bool)> {
    let existing = dm_channels(
        state,
        &request.user_id,
        &request.agent_id,
        request.session_id.as_deref(),
    )
    .await?;

    if let Some(found) = existing.into_iter().next() {
        tracing::info!(channel_id = %found.channel.id, "reusing DM channel");
        return Ok((found.raw, false));
    }

    let channel = create_dm_channel(state, request).await?;
    Ok((channel, true))
}

pub(crate) async fn create_dm_channel(
    state: &AppState,
    request: DmChannelRequest,
) -> ApiResult<Value> {
    let channel_id = request.channel_id.unwrap_or_else(|| {
        format!(
            "dm-{}-{}-{}",
            request.user_id,
            request.agent_id,
            Utc::now().timestamp_millis()
        )
    });
    let name = request.title.clone().unwrap_or_else(|| {
        format!("Chat - {}", Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p"))
    });

    let mut metadata = ChannelMetadata::direct_message(&request.user_id, &request.agent_id);
    metadata.title = request.title;
    metadata.session_id = request.session_id;
    metadata.initial_message = request.initial_message;

    let participants = vec![request.user_id.clone(), request.agent_id.clone()];
    let new_channel = NewChannel {
        id: channel_id.clone(),
        name: name.clone(),
        server_id: CENTRAL_SERVER_ID.to_string(),
        participant_central_user_ids: participants.clone(),
        channel_type: DM_CHANNEL_TYPE.to_string(),
        metadata: metadata.clone(),
    };

    let upstream = state
        .messaging
        .create_channel(&new_channel)
        .await
        .map_err(|e| ApiError::upstream("Failed to create DM channel", e))?;

    // The agent may already be a participant.
    if let Err(e) = state
        .messaging
        .add_agent_to_channel(&channel_id, &request.agent_id)
        .await
    {
        tracing::warn!(%channel_id, error = %e, "failed to add agent to channel");
    }

    tracing::info!(%channel_id, "created DM channel");

    let mut channel = json!({
        "id": channel_id,
        "name": name,
        "type": DM_CHANNEL_TYPE,
        "metadata": metadata,
        "participants": participants,
    });
    // Upstream fields win over the locally built ones.
    if let (Some(target), Value::Object(fields)) = (channel.as_object_mut(), upstream) {
        target.extend(fields);
    }
    Ok(channel)
}

pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn require_pair(user_id: Option<String>, agent_id: Option<String>) -> ApiResult<(String, String)> {
    match (present(user_id), present(agent_id)) {
        (Some(user), Some(agent)) => Ok((user, agent)),
        _ => Err(ApiError::bad_request("userId and agentId are required")),
    }
}
