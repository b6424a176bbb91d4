use super::codec::{self, EnginePacket, SocketPacket};
use crate::error::{ElizaError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Outbound half of a socket connection.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    /// Emits `event` with `data`; `Value::Null` sends no argument.
    async fn emit(&self, event: &str, data: Value) -> Result<()>;

    /// Closes the connection; no reconnection follows.
    async fn close(&self);
}

/// Connection settings. Reconnection is a fixed policy: a constant delay
/// between attempts and a fixed number of attempts.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub url: String,
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
    pub timeout: Duration,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnection_attempts: 5,
            reconnection_delay: Duration::from_millis(1000),
            timeout: Duration::from_millis(20_000),
        }
    }

    /// `http(s)://host:port` -> `ws(s)://host:port/socket.io/?EIO=4&transport=websocket`
    pub fn websocket_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/socket.io/?EIO=4&transport=websocket", base)
    }
}

/// An event received from the server, or a connection lifecycle event
/// (`connect`, `disconnect`, `connect_error`, `reconnect_failed`).
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub name: String,
    pub data: Value,
}

impl InboundEvent {
    fn lifecycle(name: &str, data: Value) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }
}

enum Command {
    Emit(String),
    Close,
}

enum SessionEnd {
    /// Closed from this side; stop for good.
    Closed,
    /// The server disconnected the namespace; reconnect right away.
    ServerDisconnect,
    /// The connection dropped.
    Lost(String),
}

/// Socket.IO over a raw websocket, driven by a background task.
pub struct WsTransport {
    commands: mpsc::UnboundedSender<Command>,
}

impl WsTransport {
    /// Starts the connection task. Inbound events arrive on the returned receiver,
    /// which closes once the task gives up or is closed.
    pub fn spawn(config: SocketConfig) -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(config, command_rx, inbound_tx));
        (Self { commands }, inbound_rx)
    }
}

#[async_trait]
impl SocketTransport for WsTransport {
    async fn emit(&self, event: &str, data: Value) -> Result<()> {
        self.commands
            .send(Command::Emit(codec::encode_event(event, &data)))
            .map_err(|_| ElizaError::Socket("connection task has stopped".into()))
    }

    async fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

async fn drive(
    config: SocketConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    inbound: mpsc::UnboundedSender<InboundEvent>,
) {
    let url = config.websocket_url();
    let mut failures = 0u32;
    // Frames emitted before the namespace is connected are held here.
    let mut pending: Vec<String> = Vec::new();

    loop {
        tracing::info!(%url, "connecting to agent server");
        let end = match tokio::time::timeout(config.timeout, connect_async(url.as_str())).await {
            Ok(Ok((ws, _))) => {
                failures = 0;
                run_session(ws, &mut commands, &inbound, &mut pending, config.timeout).await
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "connection error");
                let _ = inbound.send(InboundEvent::lifecycle(
                    "connect_error",
                    json!({ "message": e.to_string() }),
                ));
                SessionEnd::Lost(e.to_string())
            }
            Err(_) => {
                tracing::error!(timeout_ms = config.timeout.as_millis() as u64, "connection timed out");
                let _ = inbound.send(InboundEvent::lifecycle(
                    "connect_error",
                    json!({ "message": "timeout" }),
                ));
                SessionEnd::Lost("timeout".into())
            }
        };

        match end {
            SessionEnd::Closed => break,
            SessionEnd::ServerDisconnect => {
                let _ = inbound.send(InboundEvent::lifecycle(
                    "disconnect",
                    json!({ "reason": "io server disconnect" }),
                ));
                continue;
            }
            SessionEnd::Lost(reason) => {
                failures += 1;
                if failures > config.reconnection_attempts {
                    tracing::error!(attempts = config.reconnection_attempts, "giving up on reconnection");
                    let _ = inbound.send(InboundEvent::lifecycle("reconnect_failed", Value::Null));
                    break;
                }
                tracing::warn!(%reason, attempt = failures, "reconnecting");
            }
        }

        // Wait out the delay, but honour a close request that arrives meanwhile.
        let sleep = tokio::time::sleep(config.reconnection_delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = commands.recv() => match cmd {
                    Some(Command::Emit(frame)) => pending.push(frame),
                    Some(Command::Close) | None => return,
                },
            }
        }
    }
}

/// Runs one connection until it ends. The server must send something at least
/// every `pingInterval + pingTimeout` once the handshake is in, and within
/// `handshake_timeout` before that.
async fn run_session<S>(
    ws: tokio_tungstenite::WebSocketStream<S>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    inbound: &mpsc::UnboundedSender<InboundEvent>,
    pending: &mut Vec<String>,
    handshake_timeout: Duration,
) -> SessionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();
    let mut connected = false;
    let mut grace = handshake_timeout;
    let deadline = tokio::time::sleep(grace);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                tracing::warn!(grace_ms = grace.as_millis() as u64, "no heartbeat from server");
                if connected {
                    let _ = inbound.send(InboundEvent::lifecycle(
                        "disconnect",
                        json!({ "reason": "ping timeout" }),
                    ));
                }
                return SessionEnd::Lost("ping timeout".into());
            }
            frame = read.next() => {
                if let Some(Ok(_)) = &frame {
                    deadline.as_mut().reset(Instant::now() + grace);
                }
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        if connected {
                            let _ = inbound.send(InboundEvent::lifecycle(
                                "disconnect",
                                json!({ "reason": "transport close" }),
                            ));
                        }
                        return SessionEnd::Lost("transport close".into());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        if connected {
                            let _ = inbound.send(InboundEvent::lifecycle(
                                "disconnect",
                                json!({ "reason": "transport error" }),
                            ));
                        }
                        return SessionEnd::Lost(e.to_string());
                    }
                };

                let packet = match codec::decode(text.as_str()) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable frame");
                        continue;
                    }
                };

                match packet {
                    EnginePacket::Open(open) => {
                        tracing::debug!(sid = %open.sid, "engine handshake");
                        grace = open.heartbeat_timeout();
                        deadline.as_mut().reset(Instant::now() + grace);
                        if write.send(Message::Text(codec::encode_connect(None).into())).await.is_err() {
                            return SessionEnd::Lost("write failed".into());
                        }
                    }
                    EnginePacket::Ping(payload) => {
                        let pong = format!("{}{}", codec::PONG, payload);
                        if write.send(Message::Text(pong.into())).await.is_err() {
                            return SessionEnd::Lost("write failed".into());
                        }
                    }
                    EnginePacket::Close => return SessionEnd::Lost("engine close".into()),
                    EnginePacket::Message(SocketPacket::Connect { data, .. }) => {
                        connected = true;
                        for frame in pending.drain(..) {
                            if write.send(Message::Text(frame.into())).await.is_err() {
                                return SessionEnd::Lost("write failed".into());
                            }
                        }
                        let _ = inbound.send(InboundEvent::lifecycle(
                            "connect",
                            data.unwrap_or(Value::Null),
                        ));
                    }
                    EnginePacket::Message(SocketPacket::Event { name, mut args, .. }) => {
                        let data = if args.is_empty() { Value::Null } else { args.swap_remove(0) };
                        let _ = inbound.send(InboundEvent { name, data });
                    }
                    EnginePacket::Message(SocketPacket::Disconnect { .. }) => {
                        return SessionEnd::ServerDisconnect;
                    }
                    EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                        let _ = inbound.send(InboundEvent::lifecycle(
                            "connect_error",
                            data.unwrap_or(Value::Null),
                        ));
                        return SessionEnd::Lost("namespace connect refused".into());
                    }
                    EnginePacket::Message(SocketPacket::Ack { .. })
                    | EnginePacket::Pong(_)
                    | EnginePacket::Upgrade
                    | EnginePacket::Noop => {}
                }
            }
            cmd = commands.recv() => match cmd {
                Some(Command::Emit(frame)) => {
                    if !connected {
                        pending.push(frame);
                    } else if write.send(Message::Text(frame.clone().into())).await.is_err() {
                        pending.push(frame);
                        return SessionEnd::Lost("write failed".into());
                    }
                }
                Some(Command::Close) | None => {
                    let _ = write.send(Message::Text(codec::encode_disconnect().into())).await;
                    let _ = write.send(Message::Close(None)).await;
                    let _ = inbound.send(InboundEvent::lifecycle(
                        "disconnect",
                        json!({ "reason": "io client disconnect" }),
                    ));
                    return SessionEnd::Closed;
                }
            },
        }
    }
}
