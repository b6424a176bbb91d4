//! Derives the client-facing chat-session list from DM channels.

use crate::models::{Channel, ChannelMessage, ChatSession};

const DEFAULT_TITLE: &str = "New Chat";
const PREVIEW_CHARS: usize = 100;

/// A channel counts as a chat session when it is a DM for `agent_id`, tagged
/// with a session id, and held between `user_id` and `agent_id`.
pub fn is_session_channel(channel: &Channel, user_id: &str, agent_id: &str) -> bool {
    let meta = &channel.metadata;
    channel.is_dm_type()
        && meta.is_dm == Some(true)
        && meta.for_agent.as_deref() == Some(agent_id)
        && meta.session_id.as_deref().is_some_and(|s| !s.is_empty())
        && meta.is_between(user_id, agent_id)
}

/// Looser predicate used by the DM channel listing: either DM marker is enough.
pub fn is_dm_channel_for(channel: &Channel, user_id: &str, agent_id: &str) -> bool {
    let meta = &channel.metadata;
    (channel.is_dm_type() || meta.is_dm == Some(true))
        && meta.for_agent.as_deref() == Some(agent_id)
        && meta.is_between(user_id, agent_id)
}

/// Builds a session view. `messages` is `None` when fetching them failed.
pub fn build_session(
    channel: &Channel,
    messages: Option<Vec<ChannelMessage>>,
    user_id: &str,
    agent_id: &str,
) -> ChatSession {
    let id = channel
        .metadata
        .session_id
        .clone()
        .unwrap_or_else(|| channel.id.clone());
    let fallback_title = channel
        .metadata
        .initial_message
        .clone()
        .or_else(|| channel.name.clone())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let Some(mut messages) = messages else {
        return ChatSession {
            id,
            channel_id: channel.id.clone(),
            title: fallback_title,
            message_count: 0,
            last_activity: channel.updated_at.or(channel.created_at),
            preview: String::new(),
            is_from_agent: false,
            created_at: channel.created_at,
        };
    };

    // Stable sort keeps server order for messages without a timestamp.
    messages.sort_by_key(|m| m.created_at);

    let title = messages
        .iter()
        .find(|m| m.is_from(user_id))
        .and_then(|m| m.content.clone())
        .filter(|c| !c.is_empty())
        .unwrap_or(fallback_title);

    let last = messages.last();
    let preview = last
        .and_then(|m| m.content.as_deref())
        .map(|c| c.chars().take(PREVIEW_CHARS).collect())
        .unwrap_or_default();

    ChatSession {
        id,
        channel_id: channel.id.clone(),
        title,
        message_count: messages.len(),
        last_activity: last
            .and_then(|m| m.created_at)
            .or(channel.updated_at)
            .or(channel.created_at),
        preview,
        is_from_agent: last.and_then(|m| m.author_id.as_deref()) == Some(agent_id),
        created_at: channel.created_at,
    }
}

/// Most recent activity first; sessions without a timestamp go last.
pub fn sort_by_last_activity(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
}

/// Newest `metadata.createdAt` first; channels without one go last.
pub fn sort_by_metadata_created_at<T>(items: &mut [T], channel: impl Fn(&T) -> &Channel) {
    items.sort_by(|a, b| {
        channel(b)
            .metadata
            .created_at
            .cmp(&channel(a).metadata.created_at)
    });
}
