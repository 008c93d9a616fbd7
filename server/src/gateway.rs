//! Per-connection protocol state: player binding, inbound dispatch and
//! heartbeat liveness.
//!
//! A connection is `Connecting` until the game loop has seen it, `Open` while
//! it sits in the table below, and `Closed` once removed. Removal is the only
//! path that releases the bound player, so it happens exactly once.

use crate::registry::SessionRegistry;
use soccer_shared::protocol::{ClientMsg, ServerMsg};
use std::collections::HashMap;
use tokio::sync::mpsc;

pub type ConnId = u64;

/// Why the server closed a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ServerFull,
    TimedOut,
    ProtocolViolation,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ServerFull => "server full",
            CloseReason::TimedOut => "timed out",
            CloseReason::ProtocolViolation => "protocol violation",
        }
    }
}

/// Directed traffic from the game loop to one connection task
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(ServerMsg),
    Close(CloseReason),
}

/// Returned to a connection once it is admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    pub conn_id: ConnId,
    pub player_id: u32,
}

struct Connection {
    player_id: Option<u32>,
    alive: bool,
    outbox: mpsc::Sender<Outbound>,
}

impl Connection {
    /// Never waits: a full or closed outbox drops the message.
    fn send(&self, msg: Outbound) {
        if let Err(e) = self.outbox.try_send(msg) {
            tracing::debug!("Dropped outbound message: {}", e);
        }
    }
}

pub struct Gateway {
    connections: HashMap<ConnId, Connection>,
    next_conn_id: ConnId,
    max_players: usize,
}

impl Gateway {
    pub fn new(max_players: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_conn_id: 1,
            max_players,
        }
    }

    /// Admit a new connection and bind a fresh player, or refuse it when
    /// the registry is full. A refused connection never gets a player.
    pub fn open(
        &mut self,
        registry: &mut SessionRegistry,
        outbox: mpsc::Sender<Outbound>,
    ) -> Result<Joined, CloseReason> {
        if registry.len() >= self.max_players {
            return Err(CloseReason::ServerFull);
        }

        let player_id = registry.create_player().id;
        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;

        let conn = Connection {
            player_id: Some(player_id),
            alive: true,
            outbox,
        };
        conn.send(Outbound::Message(ServerMsg::Init(player_id)));
        self.connections.insert(conn_id, conn);

        Ok(Joined { conn_id, player_id })
    }

    /// Apply one inbound message. Messages for unknown connections are
    /// ignored; they can arrive after a server-side close.
    pub fn dispatch(&mut self, registry: &mut SessionRegistry, conn_id: ConnId, msg: ClientMsg) {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            return;
        };

        match msg {
            ClientMsg::Pong => conn.alive = true,
            ClientMsg::Controls(controls) => {
                if let Some(player) = conn.player_id.and_then(|id| registry.get_mut(id)) {
                    player.controls = controls;
                }
            }
            ClientMsg::SetName(name) => {
                if let Some(player) = conn.player_id.and_then(|id| registry.get_mut(id)) {
                    player.set_name(&name);
                }
            }
        }
    }

    /// Ping every live connection and drop the ones that ignored the previous
    /// ping. Returns the ids of connections closed for timing out.
    pub fn heartbeat(&mut self, registry: &mut SessionRegistry) -> Vec<ConnId> {
        let stale: Vec<ConnId> = self
            .connections
            .iter()
            .filter(|(_, conn)| !conn.alive)
            .map(|(id, _)| *id)
            .collect();

        for conn_id in &stale {
            self.close(registry, *conn_id, Some(CloseReason::TimedOut));
        }

        for conn in self.connections.values_mut() {
            conn.alive = false;
            conn.send(Outbound::Message(ServerMsg::Ping(0)));
        }

        stale
    }

    /// Remove a connection and release its player. With a reason, the
    /// connection task is told to close the socket. Closing twice is a no-op.
    pub fn close(
        &mut self,
        registry: &mut SessionRegistry,
        conn_id: ConnId,
        reason: Option<CloseReason>,
    ) -> Option<u32> {
        let conn = self.connections.remove(&conn_id)?;
        if let Some(reason) = reason {
            conn.send(Outbound::Close(reason));
        }
        let player_id = conn.player_id?;
        registry.remove_player(player_id);
        Some(player_id)
    }

    #[cfg(test)]
    fn player_for(&self, conn_id: ConnId) -> Option<u32> {
        self.connections.get(&conn_id).and_then(|c| c.player_id)
    }

    #[cfg(test)]
    fn is_alive(&self, conn_id: ConnId) -> bool {
        self.connections.get(&conn_id).is_some_and(|c| c.alive)
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
