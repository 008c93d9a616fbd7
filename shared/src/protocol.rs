use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::{FieldConfig, GoalConfig};
use crate::vec2::Vec2;

/// Longest display name accepted, in characters.
pub const MAX_NAME_CHARS: usize = 20;

// === Server -> Client ===
//
// Every frame is `{ "type": ..., "payload": ... }` serialized as text.

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(tag = "type", content = "payload")]
pub enum ServerMsg {
    /// Assigned player id, sent once after joining
    #[serde(rename = "init")]
    Init(u32),
    /// Heartbeat probe; payload is ignored by clients
    #[serde(rename = "ping")]
    Ping(u32),
    #[serde(rename = "tick")]
    Tick(TickMsg),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/generated/")]
pub struct TickMsg {
    pub snapshot: SnapshotWire,
    pub score: [u32; 2],
    /// Server wall clock, milliseconds since the Unix epoch
    #[ts(type = "number")]
    pub time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/generated/")]
pub struct SnapshotWire {
    /// Keyed by player id
    pub players: BTreeMap<u32, PlayerWire>,
    pub ball: BallWire,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerWire {
    pub id: u32,
    pub name: String,
    pub team: u8,
    pub pos: Vec2,
    pub vel: Vec2,
    pub controls: Controls,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(rename_all = "camelCase")]
pub struct BallWire {
    pub pos: Vec2,
    pub vel: Vec2,
    pub last_hit_by: Option<u32>,
}

/// Descriptor served at `/game-info` so clients can size the field.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub port: u16,
    pub field: FieldConfig,
    pub player_radius: f64,
    pub ball_radius: f64,
    pub goals: GoalConfig,
    pub tickrate: u32,
}

// === Client -> Server ===

/// Held directions. Opposite directions may both be set; physics cancels them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../static/generated/")]
pub struct Controls {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "../../static/generated/")]
#[serde(tag = "type", content = "payload")]
pub enum ClientMsg {
    #[serde(rename = "controls")]
    Controls(Controls),
    #[serde(rename = "set name")]
    SetName(String),
    #[serde(rename = "pong")]
    Pong,
}

/// Raw inbound frame before dispatch on `type`.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Why an inbound frame was rejected.
#[derive(Debug)]
pub enum ProtocolError {
    /// Not a `{type, payload}` JSON object
    Malformed(serde_json::Error),
    /// Well-formed frame with a type nobody handles
    UnknownType(String),
    /// Known type whose payload has the wrong shape
    BadPayload {
        kind: &'static str,
        source: serde_json::Error,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Malformed(e) => write!(f, "malformed message: {}", e),
            ProtocolError::UnknownType(kind) => write!(f, "unknown message type \"{}\"", kind),
            ProtocolError::BadPayload { kind, source } => {
                write!(f, "bad payload for \"{}\": {}", kind, source)
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Malformed(e) => Some(e),
            ProtocolError::BadPayload { source, .. } => Some(source),
            ProtocolError::UnknownType(_) => None,
        }
    }
}

impl ClientMsg {
    /// Decode one text frame. The payload of `pong` is ignored.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(ProtocolError::Malformed)?;
        match envelope.kind.as_str() {
            "controls" => serde_json::from_value(envelope.payload)
                .map(ClientMsg::Controls)
                .map_err(|source| ProtocolError::BadPayload {
                    kind: "controls",
                    source,
                }),
            "set name" => serde_json::from_value(envelope.payload)
                .map(ClientMsg::SetName)
                .map_err(|source| ProtocolError::BadPayload {
                    kind: "set name",
                    source,
                }),
            "pong" => Ok(ClientMsg::Pong),
            _ => Err(ProtocolError::UnknownType(envelope.kind)),
        }
    }
}
