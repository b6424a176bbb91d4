use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Numeric message kinds understood by the agent server's `message` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SocketMessageType {
    RoomJoining = 1,
    SendMessage = 2,
    Message = 3,
    Ack = 4,
    Thinking = 5,
    Control = 6,
}

impl Serialize for SocketMessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Envelope for the outbound `message` event.
#[derive(Serialize, Debug, Clone)]
pub struct OutboundMessage<P> {
    #[serde(rename = "type")]
    pub kind: SocketMessageType,
    pub payload: P,
}

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoiningPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub sender_id: String,
    pub sender_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_id: Option<String>,
    pub message_id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Events that carry the channel (or legacy room) they belong to.
pub trait ChannelScoped {
    fn channel_id(&self) -> Option<&str>;
    fn room_id(&self) -> Option<&str>;
}

macro_rules! channel_scoped {
    ($($ty:ty),* $(,)?) => {
        $(impl ChannelScoped for $ty {
            fn channel_id(&self) -> Option<&str> {
                self.channel_id.as_deref()
            }
            fn room_id(&self) -> Option<&str> {
                self.room_id.as_deref()
            }
        })*
    };
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageBroadcastData {
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageCompleteData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    EnableInput,
    DisableInput,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlMessageData {
    pub action: ControlAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedData {
    #[serde(default)]
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelClearedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDeletedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogStreamData {
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

channel_scoped!(
    MessageBroadcastData,
    MessageCompleteData,
    ControlMessageData,
    MessageDeletedData,
    ChannelClearedData,
    ChannelDeletedData,
);

/// What listeners of a [`super::SocketManager`] receive.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RelayEvent {
    MessageBroadcast(MessageBroadcastData),
    MessageComplete(MessageCompleteData),
    ControlMessage(ControlMessageData),
    MessageDeleted(MessageDeletedData),
    ChannelCleared(ChannelClearedData),
    ChannelDeleted(ChannelDeletedData),
    LogStream(LogStreamData),
}

impl RelayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::MessageBroadcast(_) => "messageBroadcast",
            RelayEvent::MessageComplete(_) => "messageComplete",
            RelayEvent::ControlMessage(_) => "controlMessage",
            RelayEvent::MessageDeleted(_) => "messageDeleted",
            RelayEvent::ChannelCleared(_) => "channelCleared",
            RelayEvent::ChannelDeleted(_) => "channelDeleted",
            RelayEvent::LogStream(_) => "logStream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_type_serializes_as_number() {
        let msg = OutboundMessage {
            kind: SocketMessageType::RoomJoining,
            payload: RoomJoiningPayload {
                channel_id: Some("c1".into()),
                entity_id: "e1".into(),
                metadata: Some(json!({ "isDm": false })),
                ..Default::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": 1,
                "payload": { "channelId": "c1", "entityId": "e1", "metadata": { "isDm": false } }
            })
        );
    }

    #[test]
    fn broadcast_keeps_unknown_fields() {
        let data: MessageBroadcastData = serde_json::from_value(json!({
            "senderId": "a",
            "senderName": "Agent",
            "text": "hi",
            "channelId": "c1",
            "createdAt": 42,
            "source": "agent_response",
            "worldId": "w1"
        }))
        .unwrap();
        assert_eq!(data.channel_id(), Some("c1"));
        assert_eq!(data.room_id(), None);
        assert_eq!(data.extra.get("worldId"), Some(&json!("w1")));
    }

    #[test]
    fn control_action_uses_snake_case() {
        let data: ControlMessageData = serde_json::from_value(json!({
            "action": "disable_input",
            "roomId": "r1"
        }))
        .unwrap();
        assert_eq!(data.action, ControlAction::DisableInput);
        assert_eq!(data.room_id(), Some("r1"));
    }

    #[test]
    fn relay_event_is_tagged_for_clients() {
        let event = RelayEvent::ChannelCleared(ChannelClearedData {
            channel_id: Some("c1".into()),
            ..Default::default()
        });
        assert_eq!(event.name(), "channelCleared");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "event": "channelCleared", "data": { "channelId": "c1" } })
        );
    }
}
