//! Engine.IO v4 / Socket.IO v5 text framing, websocket transport only.
//!
//! Binary attachments are not supported; frames that announce them are
//! rejected.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_NAMESPACE: &str = "/";
pub const PING: &str = "2";
pub const PONG: &str = "3";

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type '{0}'")]
    UnknownType(char),
    #[error("binary attachments are not supported")]
    Binary,
    #[error("malformed payload: {0}")]
    Payload(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

impl OpenHandshake {
    /// How long the server may stay silent before the connection counts as dead.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

pub fn decode(frame: &str) -> Result<EnginePacket, CodecError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| CodecError::Payload(e.to_string())),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(CodecError::UnknownType(other)),
    }
}

fn decode_socket(packet: &str) -> Result<SocketPacket, CodecError> {
    let mut chars = packet.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let mut rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Err(CodecError::Binary);
    }

    let mut namespace = DEFAULT_NAMESPACE.to_string();
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(idx) => {
                namespace = rest[..idx].to_string();
                rest = &rest[idx + 1..];
            }
            None => {
                namespace = rest.to_string();
                rest = "";
            }
        }
    }

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let ack_id = if digits > 0 {
        let id = rest[..digits]
            .parse::<u64>()
            .map_err(|e| CodecError::Payload(e.to_string()))?;
        rest = &rest[digits..];
        Some(id)
    } else {
        None
    };

    let data: Option<Value> = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str(rest).map_err(|e| CodecError::Payload(e.to_string()))?)
    };

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace, data }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut args = match data {
                Some(Value::Array(items)) => items,
                _ => return Err(CodecError::Payload("event without array payload".into())),
            };
            if args.is_empty() {
                return Err(CodecError::Payload("event without a name".into()));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                other => return Err(CodecError::Payload(format!("event name {}", other))),
            };
            Ok(SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args,
            })
        }
        '3' => {
            let ack_id =
                ack_id.ok_or_else(|| CodecError::Payload("ack without an id".into()))?;
            let args = match data {
                Some(Value::Array(items)) => items,
                Some(other) => vec![other],
                None => Vec::new(),
            };
            Ok(SocketPacket::Ack {
                namespace,
                ack_id,
                args,
            })
        }
        '4' => Ok(SocketPacket::ConnectError { namespace, data }),
        other => Err(CodecError::UnknownType(other)),
    }
}

/// `40` for the default namespace, optionally carrying an auth payload.
pub fn encode_connect(auth: Option<&Value>) -> String {
    match auth {
        Some(auth) => format!("40{}", auth),
        None => "40".to_string(),
    }
}

pub fn encode_disconnect() -> String {
    "41".to_string()
}

/// `42["name",data]`; a `Null` payload sends the event without arguments.
pub fn encode_event(name: &str, data: &Value) -> String {
    let args = if data.is_null() {
        Value::Array(vec![Value::String(name.to_string())])
    } else {
        Value::Array(vec![Value::String(name.to_string()), data.clone()])
    };
    format!("42{}", args)
}
