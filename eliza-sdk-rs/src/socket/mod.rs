//! Real-time relay between an ElizaOS agent server and local listeners.
//!
//! A [`SocketManager`] owns one connection, remembers which channels and rooms
//! were joined, and fans filtered server events out over a broadcast bus.

pub mod codec;
pub mod events;
pub mod transport;

pub use events::*;
pub use transport::{InboundEvent, SocketConfig, SocketTransport, WsTransport};

use crate::error::{ElizaError, Result};
use crate::models::CENTRAL_SERVER_ID;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use uuid::Uuid;

const EVENT_BUS_CAPACITY: usize = 256;
pub const DEFAULT_USER_NAME: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Closed,
}

#[derive(Debug, Default)]
struct RelayState {
    active_channels: BTreeSet<String>,
    active_rooms: BTreeSet<String>,
    active_session: Option<String>,
}

impl RelayState {
    fn accepts(&self, channel_id: Option<&str>, room_id: Option<&str>) -> bool {
        let for_session = self
            .active_session
            .as_deref()
            .is_some_and(|s| channel_id == Some(s) || room_id == Some(s));
        for_session
            || channel_id.is_some_and(|c| self.active_channels.contains(c))
            || room_id.is_some_and(|r| self.active_rooms.contains(r))
    }
}

pub struct SocketManager {
    entity_id: String,
    server_id: Option<String>,
    user_name: String,
    transport: RwLock<Option<Arc<dyn SocketTransport>>>,
    state: Mutex<RelayState>,
    connection: watch::Sender<ConnectionState>,
    events: broadcast::Sender<RelayEvent>,
}

impl SocketManager {
    pub fn new(entity_id: impl Into<String>, server_id: Option<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let (connection, _) = watch::channel(ConnectionState::Closed);
        Self {
            entity_id: entity_id.into(),
            server_id,
            user_name: DEFAULT_USER_NAME.to_string(),
            transport: RwLock::new(None),
            state: Mutex::new(RelayState::default()),
            connection,
            events,
        }
    }

    /// Display name attached to outgoing messages.
    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    /// Opens the websocket connection and starts relaying its events.
    /// Calling it again while a transport is attached does nothing.
    pub async fn initialize(self: &Arc<Self>, config: SocketConfig) {
        if self.transport.read().await.is_some() {
            tracing::warn!("socket already initialized");
            return;
        }

        let (transport, mut inbound) = WsTransport::spawn(config);
        self.attach_transport(Arc::new(transport)).await;

        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle_server_event(&event.name, event.data).await;
            }
        });
    }

    /// Installs a transport. Inbound events must then be fed through
    /// [`SocketManager::handle_server_event`].
    pub async fn attach_transport(&self, transport: Arc<dyn SocketTransport>) {
        *self.transport.write().await = Some(transport);
        self.connection.send_replace(ConnectionState::Connecting);
    }

    /// Receives every event that passes the active channel filter.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub async fn handle_server_event(&self, name: &str, data: Value) {
        match name {
            "connect" => {
                tracing::info!(entity_id = %self.entity_id, "connected to server");
                self.connection.send_replace(ConnectionState::Connected);
                self.rejoin().await;
            }
            "disconnect" => {
                tracing::info!(reason = %data["reason"], "disconnected");
                self.connection.send_if_modified(|state| {
                    if *state == ConnectionState::Connected {
                        *state = ConnectionState::Connecting;
                        true
                    } else {
                        false
                    }
                });
            }
            "connect_error" => {
                tracing::error!(details = %data, "connection error");
            }
            "reconnect_failed" => {
                tracing::error!("reconnection attempts exhausted");
                self.connection.send_replace(ConnectionState::Closed);
            }
            "connection_established" => {
                tracing::info!(details = %data, "connection established");
            }
            "messageBroadcast" => {
                let Some(mut msg) = parse::<MessageBroadcastData>(name, data) else {
                    return;
                };
                if self.accepts(&msg).await {
                    msg.name = msg.sender_name.clone();
                    self.publish(RelayEvent::MessageBroadcast(msg));
                }
            }
            "messageComplete" => {
                if let Some(d) = parse::<MessageCompleteData>(name, data) {
                    if self.accepts(&d).await {
                        self.publish(RelayEvent::MessageComplete(d));
                    }
                }
            }
            "controlMessage" => {
                if let Some(d) = parse::<ControlMessageData>(name, data) {
                    if self.accepts(&d).await {
                        self.publish(RelayEvent::ControlMessage(d));
                    }
                }
            }
            "messageDeleted" => {
                if let Some(d) = parse::<MessageDeletedData>(name, data) {
                    if self.accepts(&d).await {
                        self.publish(RelayEvent::MessageDeleted(d));
                    }
                }
            }
            "channelCleared" => {
                if let Some(d) = parse::<ChannelClearedData>(name, data) {
                    if self.accepts(&d).await {
                        self.publish(RelayEvent::ChannelCleared(d));
                    }
                }
            }
            "channelDeleted" => {
                if let Some(d) = parse::<ChannelDeletedData>(name, data) {
                    if self.accepts(&d).await {
                        self.publish(RelayEvent::ChannelDeleted(d));
                    }
                }
            }
            "log_stream" => {
                if let Some(d) = parse::<LogStreamData>(name, data) {
                    self.publish(RelayEvent::LogStream(d));
                }
            }
            other => tracing::warn!(event = other, "dropping unhandled server event"),
        }
    }

    pub async fn join_channel(&self, channel_id: &str, server_id: Option<&str>) -> Result<()> {
        let transport = self.connected_transport().await?;
        self.state
            .lock()
            .await
            .active_channels
            .insert(channel_id.to_string());

        let msg = OutboundMessage {
            kind: SocketMessageType::RoomJoining,
            payload: RoomJoiningPayload {
                channel_id: Some(channel_id.to_string()),
                server_id: server_id.map(str::to_string).or_else(|| self.server_id.clone()),
                entity_id: self.entity_id.clone(),
                metadata: Some(json!({ "isDm": false })),
                ..Default::default()
            },
        };
        transport.emit("message", to_value(&msg)?).await?;
        tracing::info!(%channel_id, "joined channel");
        Ok(())
    }

    pub async fn join_room(&self, room_id: &str) -> Result<()> {
        let transport = self.connected_transport().await?;
        self.state
            .lock()
            .await
            .active_rooms
            .insert(room_id.to_string());

        let msg = OutboundMessage {
            kind: SocketMessageType::RoomJoining,
            payload: RoomJoiningPayload {
                room_id: Some(room_id.to_string()),
                entity_id: self.entity_id.clone(),
                ..Default::default()
            },
        };
        transport.emit("message", to_value(&msg)?).await?;
        tracing::info!(%room_id, "joined room");
        Ok(())
    }

    /// Stops relaying a channel. Only local bookkeeping; nothing is emitted.
    pub async fn leave_channel(&self, channel_id: &str) {
        if !self.is_connected() {
            tracing::warn!(%channel_id, "cannot leave channel: not connected");
            return;
        }
        self.state.lock().await.active_channels.remove(channel_id);
        tracing::info!(%channel_id, "left channel");
    }

    pub async fn leave_room(&self, room_id: &str) {
        if !self.is_connected() {
            tracing::warn!(%room_id, "cannot leave room: not connected");
            return;
        }
        self.state.lock().await.active_rooms.remove(room_id);
        tracing::info!(%room_id, "left room");
    }

    /// Sends `message` tagged with the session channel when one is given,
    /// otherwise with `channel_id`, and echoes it to local listeners at once.
    pub async fn send_channel_message(
        &self,
        message: &str,
        channel_id: &str,
        source: &str,
        session_channel_id: Option<&str>,
        server_id: Option<&str>,
    ) -> Result<()> {
        let transport = self.connected_transport().await?;
        let target = session_channel_id.unwrap_or(channel_id).to_string();
        tracing::info!(%channel_id, session = %target, "sending channel message");

        let msg = OutboundMessage {
            kind: SocketMessageType::SendMessage,
            payload: SendMessagePayload {
                sender_id: self.entity_id.clone(),
                sender_name: self.user_name.clone(),
                message: message.to_string(),
                channel_id: Some(target.clone()),
                room_id: target.clone(),
                server_id: server_id.map(str::to_string).or_else(|| self.server_id.clone()),
                world_id: None,
                message_id: Uuid::new_v4().to_string(),
                source: source.to_string(),
                attachments: Some(Vec::new()),
                metadata: Some(json!({})),
            },
        };
        transport.emit("message", to_value(&msg)?).await?;

        self.publish(RelayEvent::MessageBroadcast(self.local_echo(
            message,
            Some(target.clone()),
            target,
            source,
        )));
        Ok(())
    }

    /// Room-addressed variant of [`SocketManager::send_channel_message`].
    pub async fn send_message(&self, message: &str, room_id: &str, source: &str) -> Result<()> {
        let transport = self.connected_transport().await?;
        tracing::info!(%room_id, "sending room message");

        let msg = OutboundMessage {
            kind: SocketMessageType::SendMessage,
            payload: SendMessagePayload {
                sender_id: self.entity_id.clone(),
                sender_name: self.user_name.clone(),
                message: message.to_string(),
                room_id: room_id.to_string(),
                world_id: Some(CENTRAL_SERVER_ID.to_string()),
                message_id: Uuid::new_v4().to_string(),
                source: source.to_string(),
                ..Default::default()
            },
        };
        transport.emit("message", to_value(&msg)?).await?;

        self.publish(RelayEvent::MessageBroadcast(self.local_echo(
            message,
            None,
            room_id.to_string(),
            source,
        )));
        Ok(())
    }

    pub async fn subscribe_logs(&self) -> Result<()> {
        self.emit_when_connected("subscribe_logs", Value::Null).await
    }

    pub async fn unsubscribe_logs(&self) -> Result<()> {
        self.emit_when_connected("unsubscribe_logs", Value::Null).await
    }

    pub async fn update_log_filters(&self, filters: &LogFilters) -> Result<()> {
        self.emit_when_connected("update_log_filters", to_value(filters)?)
            .await
    }

    pub async fn set_active_session_channel_id(&self, channel_id: &str) {
        self.state.lock().await.active_session = Some(channel_id.to_string());
        tracing::info!(%channel_id, "active session channel set");
    }

    pub async fn clear_active_session_channel_id(&self) {
        self.state.lock().await.active_session = None;
        tracing::info!("active session channel cleared");
    }

    pub async fn active_session_channel_id(&self) -> Option<String> {
        self.state.lock().await.active_session.clone()
    }

    pub async fn active_channels(&self) -> BTreeSet<String> {
        self.state.lock().await.active_channels.clone()
    }

    pub async fn active_rooms(&self) -> BTreeSet<String> {
        self.state.lock().await.active_rooms.clone()
    }

    /// Closes the transport and forgets every joined channel and room.
    pub async fn disconnect(&self) {
        let Some(transport) = self.transport.write().await.take() else {
            return;
        };
        transport.close().await;
        self.connection.send_replace(ConnectionState::Closed);
        let mut state = self.state.lock().await;
        state.active_channels.clear();
        state.active_rooms.clear();
        tracing::info!("disconnected from server");
    }

    async fn rejoin(&self) {
        let (channels, rooms) = {
            let state = self.state.lock().await;
            (state.active_channels.clone(), state.active_rooms.clone())
        };
        for channel_id in channels {
            if let Err(e) = self.join_channel(&channel_id, None).await {
                tracing::warn!(%channel_id, error = %e, "failed to rejoin channel");
            }
        }
        for room_id in rooms {
            if let Err(e) = self.join_room(&room_id).await {
                tracing::warn!(%room_id, error = %e, "failed to rejoin room");
            }
        }
    }

    async fn accepts(&self, event: &(dyn ChannelScoped + Sync)) -> bool {
        let state = self.state.lock().await;
        let accepted = state.accepts(event.channel_id(), event.room_id());
        if !accepted {
            tracing::warn!(
                channel_id = ?event.channel_id(),
                room_id = ?event.room_id(),
                active_session = ?state.active_session,
                "event for inactive channel dropped"
            );
        }
        accepted
    }

    fn publish(&self, event: RelayEvent) {
        tracing::debug!(event = event.name(), "relaying");
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn local_echo(
        &self,
        text: &str,
        channel_id: Option<String>,
        room_id: String,
        source: &str,
    ) -> MessageBroadcastData {
        MessageBroadcastData {
            sender_id: self.entity_id.clone(),
            sender_name: self.user_name.clone(),
            text: text.to_string(),
            channel_id,
            room_id: Some(room_id),
            created_at: Utc::now().timestamp_millis(),
            source: source.to_string(),
            name: self.user_name.clone(),
            ..Default::default()
        }
    }

    /// Waits until the connection is up and returns the transport.
    async fn connected_transport(&self) -> Result<Arc<dyn SocketTransport>> {
        let transport = self
            .transport
            .read()
            .await
            .clone()
            .ok_or(ElizaError::NotConnected)?;

        let mut rx = self.connection.subscribe();
        let state = *rx
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .map_err(|_| ElizaError::NotConnected)?;
        if state == ConnectionState::Closed {
            return Err(ElizaError::NotConnected);
        }
        Ok(transport)
    }

    async fn emit_when_connected(&self, event: &str, data: Value) -> Result<()> {
        if !self.is_connected() {
            tracing::warn!(event, "not connected; skipping");
            return Ok(());
        }
        let Some(transport) = self.transport.read().await.clone() else {
            return Ok(());
        };
        transport.emit(event, data).await?;
        tracing::info!(event, "emitted");
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(event: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(event, error = %e, "malformed event payload");
            None
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingTransport {
        sent: StdMutex<Vec<(String, Value)>>,
        closed: StdMutex<bool>,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<(String, Value)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SocketTransport for RecordingTransport {
        async fn emit(&self, event: &str, data: Value) -> Result<()> {
            self.sent.lock().unwrap().push((event.to_string(), data));
            Ok(())
        }

        async fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    async fn connected_manager() -> (SocketManager, Arc<RecordingTransport>) {
        let manager = SocketManager::new("user-1", Some("server-1".into()));
        let transport = Arc::new(RecordingTransport::default());
        manager.attach_transport(transport.clone()).await;
        manager.handle_server_event("connect", Value::Null).await;
        (manager, transport)
    }

    fn broadcast(channel_id: &str) -> Value {
        json!({
            "senderId": "agent-1",
            "senderName": "Eliza",
            "text": "hello",
            "channelId": channel_id,
            "createdAt": 1,
            "source": "agent_response"
        })
    }

    #[tokio::test]
    async fn join_channel_emits_room_joining() {
        let (manager, transport) = connected_manager().await;
        manager.join_channel("c1", None).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "message");
        assert_eq!(
            sent[0].1,
            json!({
                "type": 1,
                "payload": {
                    "channelId": "c1",
                    "serverId": "server-1",
                    "entityId": "user-1",
                    "metadata": { "isDm": false }
                }
            })
        );
        assert!(manager.active_channels().await.contains("c1"));
    }

    #[tokio::test]
    async fn drops_events_whose_channel_id_is_not_in_the_active_set() {
        let (manager, _transport) = connected_manager().await;
        manager.join_channel("c1", None).await.unwrap();
        let mut rx = manager.subscribe();

        manager.handle_server_event("messageBroadcast", broadcast("other")).await;
        manager.handle_server_event("messageBroadcast", broadcast("c1")).await;

        match rx.try_recv().unwrap() {
            RelayEvent::MessageBroadcast(msg) => {
                assert_eq!(msg.channel_id.as_deref(), Some("c1"));
                assert_eq!(msg.name, "Eliza");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn active_session_and_rooms_pass_the_filter() {
        let (manager, _transport) = connected_manager().await;
        manager.set_active_session_channel_id("session-ch").await;
        manager.join_room("room-1").await.unwrap();
        let mut rx = manager.subscribe();

        manager
            .handle_server_event("messageBroadcast", broadcast("session-ch"))
            .await;
        manager
            .handle_server_event(
                "controlMessage",
                json!({ "action": "enable_input", "roomId": "room-1" }),
            )
            .await;
        manager
            .handle_server_event("channelCleared", json!({ "channelId": "elsewhere" }))
            .await;

        assert_eq!(rx.try_recv().unwrap().name(), "messageBroadcast");
        assert_eq!(rx.try_recv().unwrap().name(), "controlMessage");
        assert!(rx.try_recv().is_err());

        manager.clear_active_session_channel_id().await;
        manager
            .handle_server_event("messageBroadcast", broadcast("session-ch"))
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn log_stream_is_not_filtered() {
        let (manager, _transport) = connected_manager().await;
        let mut rx = manager.subscribe();
        manager
            .handle_server_event("log_stream", json!({ "level": 30, "time": 5, "msg": "tick" }))
            .await;
        match rx.try_recv().unwrap() {
            RelayEvent::LogStream(log) => assert_eq!(log.msg, "tick"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn reconnect_rejoins_channels_and_rooms() {
        let (manager, transport) = connected_manager().await;
        manager.join_channel("c1", None).await.unwrap();
        manager.join_room("r1").await.unwrap();

        manager
            .handle_server_event("disconnect", json!({ "reason": "transport close" }))
            .await;
        assert!(!manager.is_connected());
        manager.handle_server_event("connect", Value::Null).await;
        assert!(manager.is_connected());

        let sent = transport.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[2].1["payload"]["channelId"], "c1");
        assert_eq!(sent[3].1["payload"]["roomId"], "r1");
    }

    #[tokio::test]
    async fn channel_message_targets_session_and_echoes_locally() {
        let (manager, transport) = connected_manager().await;
        let mut rx = manager.subscribe();

        manager
            .send_channel_message("hi", "central", "client_chat", Some("session-ch"), None)
            .await
            .unwrap();

        let sent = transport.sent();
        let payload = &sent[0].1["payload"];
        assert_eq!(sent[0].1["type"], 2);
        assert_eq!(payload["channelId"], "session-ch");
        assert_eq!(payload["roomId"], "session-ch");
        assert_eq!(payload["serverId"], "server-1");
        assert_eq!(payload["senderName"], "User");
        assert_eq!(payload["attachments"], json!([]));

        match rx.try_recv().unwrap() {
            RelayEvent::MessageBroadcast(echo) => {
                assert_eq!(echo.text, "hi");
                assert_eq!(echo.sender_id, "user-1");
                assert_eq!(echo.channel_id.as_deref(), Some("session-ch"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn room_message_carries_world_id() {
        let (manager, transport) = connected_manager().await;
        manager.send_message("hi", "room-1", "client_chat").await.unwrap();

        let payload = &transport.sent()[0].1["payload"];
        assert_eq!(payload["roomId"], "room-1");
        assert_eq!(payload["worldId"], CENTRAL_SERVER_ID);
        assert!(payload.get("channelId").is_none());
    }

    #[tokio::test]
    async fn join_waits_for_connection() {
        let manager = Arc::new(SocketManager::new("user-1", None));
        let transport = Arc::new(RecordingTransport::default());
        manager.attach_transport(transport.clone()).await;

        let joining = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.join_channel("c1", None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(transport.sent().is_empty());

        manager.handle_server_event("connect", Value::Null).await;
        joining.await.unwrap().unwrap();
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn log_commands_are_skipped_while_disconnected() {
        let manager = SocketManager::new("user-1", None);
        let transport = Arc::new(RecordingTransport::default());
        manager.attach_transport(transport.clone()).await;

        manager.subscribe_logs().await.unwrap();
        assert!(transport.sent().is_empty());

        manager.handle_server_event("connect", Value::Null).await;
        manager
            .update_log_filters(&LogFilters {
                agent_name: Some("Eliza".into()),
                level: None,
            })
            .await
            .unwrap();
        assert_eq!(
            transport.sent(),
            vec![("update_log_filters".to_string(), json!({ "agentName": "Eliza" }))]
        );
    }

    #[tokio::test]
    async fn disconnect_clears_state_and_fails_pending_joins() {
        let (manager, transport) = connected_manager().await;
        manager.join_channel("c1", None).await.unwrap();
        manager.disconnect().await;

        assert!(*transport.closed.lock().unwrap());
        assert!(manager.active_channels().await.is_empty());
        assert!(matches!(
            manager.join_channel("c2", None).await,
            Err(ElizaError::NotConnected)
        ));
    }
}
