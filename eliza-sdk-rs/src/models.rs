use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Id of the default central server every ElizaOS install exposes.
pub const CENTRAL_SERVER_ID: &str = "00000000-0000-0000-0000-000000000000";

pub const DM_CHANNEL_TYPE: &str = "DM";

/// A server-side conversation container.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub channel_type: Option<String>,
    #[serde(default, alias = "server_id", skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ChannelMetadata,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Channel {
    pub fn is_dm_type(&self) -> bool {
        self.channel_type.as_deref() == Some(DM_CHANNEL_TYPE)
    }
}

/// A channel alongside the object the server sent, so it can be relayed unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChannel {
    pub channel: Channel,
    pub raw: Value,
}

impl RawChannel {
    pub fn parse(raw: Value) -> serde_json::Result<Self> {
        let channel = Channel::deserialize(&raw)?;
        Ok(Self { channel, raw })
    }
}

/// DM bookkeeping stored on the channel by this gateway.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dm: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "flexible_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChannelMetadata {
    /// Metadata for a fresh DM between `user_id` and `agent_id`.
    pub fn direct_message(user_id: &str, agent_id: &str) -> Self {
        Self {
            is_dm: Some(true),
            user1: Some(user_id.to_string()),
            user2: Some(agent_id.to_string()),
            for_agent: Some(agent_id.to_string()),
            created_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// True when the two participants are `a` and `b`, in either order.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        let (u1, u2) = (self.user1.as_deref(), self.user2.as_deref());
        (u1 == Some(a) && u2 == Some(b)) || (u1 == Some(b) && u2 == Some(a))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub sender_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub raw_message: Option<RawMessage>,
}

impl ChannelMessage {
    pub fn is_from(&self, entity_id: &str) -> bool {
        self.author_id.as_deref() == Some(entity_id)
            || self
                .raw_message
                .as_ref()
                .and_then(|r| r.sender_id.as_deref())
                == Some(entity_id)
    }
}

/// Client-facing view of one chat session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub message_count: usize,
    pub last_activity: Option<DateTime<Utc>>,
    pub preview: String,
    pub is_from_agent: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Body for `POST /api/messaging/central-channels`.
#[derive(Serialize, Debug, Clone)]
pub struct NewChannel {
    pub id: String,
    pub name: String,
    pub server_id: String,
    #[serde(rename = "participantCentralUserIds")]
    pub participant_central_user_ids: Vec<String>,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub metadata: ChannelMetadata,
}

/// Pulls a list out of the envelopes the agent server uses:
/// `{"data": {key: [...]}}`, `{key: [...]}` or a bare array.
pub fn extract_list<T>(body: Value, key: &str) -> serde_json::Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let list = match body {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => {
            let nested = map
                .get_mut("data")
                .and_then(|d| d.get_mut(key))
                .map(Value::take);
            match nested {
                Some(list) if !list.is_null() => list,
                _ => map.remove(key).unwrap_or(Value::Array(Vec::new())),
            }
        }
        _ => Value::Array(Vec::new()),
    };
    serde_json::from_value(list)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts epoch milliseconds or an RFC 3339 string.
pub fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_accepts_millis_and_iso_timestamps() {
        let channel: Channel = serde_json::from_value(json!({
            "id": "c1",
            "type": "DM",
            "createdAt": 1_700_000_000_000i64,
            "updatedAt": "2024-01-02T03:04:05Z",
            "metadata": { "isDm": true, "sessionId": "s1", "custom": 7 }
        }))
        .unwrap();

        assert!(channel.is_dm_type());
        assert_eq!(channel.created_at.unwrap().timestamp_millis(), 1_700_000_000_000);
        assert_eq!(channel.updated_at.unwrap().to_rfc3339(), "2024-01-02T03:04:05+00:00");
        assert_eq!(channel.metadata.session_id.as_deref(), Some("s1"));
        assert_eq!(channel.metadata.extra.get("custom"), Some(&json!(7)));
    }

    #[test]
    fn null_metadata_becomes_empty() {
        let channel: Channel =
            serde_json::from_value(json!({ "id": "c1", "metadata": null })).unwrap();
        assert_eq!(channel.metadata, ChannelMetadata::default());
    }

    #[test]
    fn extract_list_handles_every_envelope() {
        let nested = json!({ "success": true, "data": { "channels": [{ "id": "a" }] } });
        let flat = json!({ "channels": [{ "id": "b" }] });
        let bare = json!([{ "id": "c" }]);
        let empty = json!({ "success": true });

        let ids = |v: Value| -> Vec<String> {
            extract_list::<Channel>(v, "channels")
                .unwrap()
                .into_iter()
                .map(|c| c.id)
                .collect()
        };

        assert_eq!(ids(nested), vec!["a"]);
        assert_eq!(ids(flat), vec!["b"]);
        assert_eq!(ids(bare), vec!["c"]);
        assert!(ids(empty).is_empty());
    }

    #[test]
    fn participants_match_in_either_order() {
        let meta = ChannelMetadata::direct_message("user", "agent");
        assert!(meta.is_between("user", "agent"));
        assert!(meta.is_between("agent", "user"));
        assert!(!meta.is_between("user", "other"));
    }

    #[test]
    fn message_sender_falls_back_to_raw_message() {
        let msg: ChannelMessage = serde_json::from_value(json!({
            "authorId": "someone",
            "rawMessage": { "senderId": "user" }
        }))
        .unwrap();
        assert!(msg.is_from("user"));
        assert!(msg.is_from("someone"));
        assert!(!msg.is_from("agent"));
    }

    #[test]
    fn new_channel_serializes_wire_names() {
        let body = NewChannel {
            id: "dm-1".into(),
            name: "Chat".into(),
            server_id: CENTRAL_SERVER_ID.into(),
            participant_central_user_ids: vec!["u".into(), "a".into()],
            channel_type: DM_CHANNEL_TYPE.into(),
            metadata: ChannelMetadata::direct_message("u", "a"),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["type"], "DM");
        assert_eq!(value["server_id"], CENTRAL_SERVER_ID);
        assert_eq!(value["participantCentralUserIds"], json!(["u", "a"]));
        assert_eq!(value["metadata"]["isDm"], true);
        assert_eq!(value["metadata"]["forAgent"], "a");
    }
}
