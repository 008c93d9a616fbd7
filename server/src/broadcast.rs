//! Snapshot fan-out. Each period the full state is serialized once and the
//! same bytes go to every subscribed connection.

use crate::state::GameState;
use axum::extract::ws::Utf8Bytes;
use soccer_shared::protocol::ServerMsg;
use std::time::{SystemTime, UNIX_EPOCH};

/// Broadcasts from game loop to all clients
#[derive(Debug, Clone)]
pub enum GameBroadcast {
    /// Pre-serialized `tick` frame
    Tick(Utf8Bytes),
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Serialize the current state as one `tick` frame.
pub fn encode_tick(state: &GameState, time: u64) -> Result<Utf8Bytes, serde_json::Error> {
    let json = serde_json::to_string(&ServerMsg::Tick(state.snapshot(time)))?;
    Ok(json.into())
}
