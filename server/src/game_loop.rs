use crate::broadcast::{encode_tick, now_millis, GameBroadcast};
use crate::config::ServerConfig;
use crate::gateway::{CloseReason, ConnId, Joined, Outbound};
use crate::state::GameState;
use soccer_shared::protocol::ClientMsg;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

/// Commands from client connections to the game loop
pub enum GameCommand {
    Connect {
        outbox: mpsc::Sender<Outbound>,
        response: oneshot::Sender<Result<Joined, CloseReason>>,
    },
    Message {
        conn_id: ConnId,
        msg: ClientMsg,
    },
    Disconnect {
        conn_id: ConnId,
    },
}

/// Run the main game loop. Owns all game state.
///
/// Simulation, broadcast and heartbeat each run on their own interval; all of
/// them and every inbound command are serialized through this one task.
pub async fn run_game_loop(
    mut cmd_rx: mpsc::Receiver<GameCommand>,
    broadcast_tx: broadcast::Sender<GameBroadcast>,
    config: ServerConfig,
) {
    let mut state = GameState::new(&config);

    let mut sim_interval = interval(config.tick_duration());
    sim_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut broadcast_interval = interval(config.tick_duration());
    broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // First ping goes out one full interval after startup
    let heartbeat_period = config.heartbeat_interval();
    let mut heartbeat_interval = interval_at(Instant::now() + heartbeat_period, heartbeat_period);
    heartbeat_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = sim_interval.tick() => {
                if let Some(goal) = state.tick() {
                    let score = state.engine.score().0;
                    tracing::info!(
                        "Goal for team {:?} (scorer {:?}), score {}:{}",
                        goal.team,
                        goal.scorer,
                        score[0],
                        score[1]
                    );
                }
            }

            _ = broadcast_interval.tick() => {
                if state.gateway.is_empty() {
                    continue;
                }
                match encode_tick(&state, now_millis()) {
                    Ok(payload) => {
                        // No receivers is fine: connections come and go
                        let _ = broadcast_tx.send(GameBroadcast::Tick(payload));
                    }
                    Err(e) => tracing::error!("Failed to serialize tick: {}", e),
                }
            }

            _ = heartbeat_interval.tick() => {
                for conn_id in state.heartbeat() {
                    tracing::warn!("Connection {} timed out", conn_id);
                }
            }

            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    GameCommand::Connect { outbox, response } => {
                        let result = state.connect(outbox);
                        match &result {
                            Ok(joined) => tracing::info!(
                                "Player {} joined on connection {}",
                                joined.player_id,
                                joined.conn_id
                            ),
                            Err(reason) => tracing::info!("Refused connection: {}", reason.as_str()),
                        }
                        if response.send(result).is_err() {
                            // Socket went away while waiting; undo the join
                            if let Ok(joined) = result {
                                state.disconnect(joined.conn_id);
                            }
                        }
                    }
                    GameCommand::Message { conn_id, msg } => {
                        state.handle_message(conn_id, msg);
                    }
                    GameCommand::Disconnect { conn_id } => {
                        if let Some(player_id) = state.disconnect(conn_id) {
                            tracing::info!("Player {} left", player_id);
                        }
                    }
                }
            }

            else => break,
        }
    }

    tracing::info!("Game loop ended");
}
