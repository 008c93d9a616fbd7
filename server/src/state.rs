use crate::config::ServerConfig;
use crate::engine::{GoalEvent, SimulationEngine};
use crate::gateway::{CloseReason, ConnId, Gateway, Joined, Outbound};
use crate::registry::SessionRegistry;
use soccer_shared::protocol::{ClientMsg, SnapshotWire, TickMsg};
use tokio::sync::mpsc;

/// Central game state owned by the game loop task.
///
/// Every mutation goes through here, so registry, physics and connection
/// bookkeeping share one writer.
pub struct GameState {
    pub registry: SessionRegistry,
    pub engine: SimulationEngine,
    pub gateway: Gateway,
    dt: f64,
}

impl GameState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registry: SessionRegistry::new(&config.game, config.rng_seed),
            engine: SimulationEngine::new(config.game),
            gateway: Gateway::new(config.max_players),
            dt: config.dt(),
        }
    }

    pub fn connect(&mut self, outbox: mpsc::Sender<Outbound>) -> Result<Joined, CloseReason> {
        self.gateway.open(&mut self.registry, outbox)
    }

    pub fn handle_message(&mut self, conn_id: ConnId, msg: ClientMsg) {
        self.gateway.dispatch(&mut self.registry, conn_id, msg);
    }

    /// Client-side or transport close. Returns the released player id.
    pub fn disconnect(&mut self, conn_id: ConnId) -> Option<u32> {
        self.gateway.close(&mut self.registry, conn_id, None)
    }

    pub fn heartbeat(&mut self) -> Vec<ConnId> {
        self.gateway.heartbeat(&mut self.registry)
    }

    /// One fixed-timestep simulation step
    pub fn tick(&mut self) -> Option<GoalEvent> {
        self.engine.step(self.dt, &mut self.registry)
    }

    /// Full state for broadcasting
    pub fn snapshot(&self, time: u64) -> TickMsg {
        TickMsg {
            snapshot: SnapshotWire {
                players: self
                    .registry
                    .players()
                    .iter()
                    .map(|(id, p)| (*id, p.to_wire()))
                    .collect(),
                ball: self.engine.ball().to_wire(),
            },
            score: self.engine.score().0,
            time,
        }
    }
}
