use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use soccer_shared::protocol::{ClientMsg, GameInfo};
use tokio::sync::{broadcast, mpsc, oneshot};
use tower_http::cors::CorsLayer;

use crate::broadcast::GameBroadcast;
use crate::game_loop::GameCommand;
use crate::gateway::{CloseReason, Outbound};

/// Inbound frames larger than this end the connection
pub const MAX_MESSAGE_BYTES: usize = 1024;

/// Directed messages queued per connection before new ones are dropped
const OUTBOX_CAPACITY: usize = 32;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub game_tx: mpsc::Sender<GameCommand>,
    pub broadcast_tx: broadcast::Sender<GameBroadcast>,
    pub game_info: GameInfo,
}

/// Routes: `/ws` for play, `/game-info` for the field descriptor
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/game-info", get(game_info_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(|socket| handle_socket(socket, app_state))
}

pub async fn game_info_handler(State(app_state): State<AppState>) -> Json<GameInfo> {
    Json(app_state.game_info)
}

fn close_message(reason: CloseReason) -> Message {
    let code = match reason {
        CloseReason::ProtocolViolation => close_code::PROTOCOL,
        CloseReason::ServerFull => close_code::AGAIN,
        CloseReason::TimedOut => close_code::NORMAL,
    };
    Message::Close(Some(CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason.as_str()),
    }))
}

async fn close_with(sink: &mut SplitSink<WebSocket, Message>, reason: CloseReason) {
    let _ = sink.send(close_message(reason)).await;
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<Outbound>(OUTBOX_CAPACITY);

    // Connecting: wait for the game loop to admit or refuse us
    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .game_tx
        .send(GameCommand::Connect {
            outbox: outbox_tx,
            response: resp_tx,
        })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Connect command");
        return;
    }

    let joined = match resp_rx.await {
        Ok(Ok(joined)) => joined,
        Ok(Err(reason)) => {
            close_with(&mut sink, reason).await;
            return;
        }
        Err(_) => {
            tracing::error!("Game loop dropped connect response");
            return;
        }
    };
    let conn_id = joined.conn_id;

    tracing::info!("Player {} connected", joined.player_id);

    // Open
    let mut broadcast_rx = app_state.broadcast_tx.subscribe();

    loop {
        tokio::select! {
            // Directed messages first so `init` precedes any tick
            biased;

            out = outbox_rx.recv() => {
                match out {
                    Some(Outbound::Message(msg)) => {
                        let json = match serde_json::to_string(&msg) {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::error!("Failed to serialize message: {}", e);
                                continue;
                            }
                        };
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close(reason)) => {
                        close_with(&mut sink, reason).await;
                        break;
                    }
                    None => break,
                }
            }

            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match ClientMsg::parse(text.as_str()) {
                        Ok(client_msg) => {
                            let cmd = GameCommand::Message { conn_id, msg: client_msg };
                            if app_state.game_tx.send(cmd).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Player {} protocol violation: {}", joined.player_id, e);
                            close_with(&mut sink, CloseReason::ProtocolViolation).await;
                            break;
                        }
                    },
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!("Player {} sent a binary frame", joined.player_id);
                        close_with(&mut sink, CloseReason::ProtocolViolation).await;
                        break;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!("Player {} socket error: {}", joined.player_id, e);
                        break;
                    }
                    _ => {} // Transport-level ping/pong
                }
            }

            // Server -> Client (broadcast)
            result = broadcast_rx.recv() => {
                match result {
                    Ok(GameBroadcast::Tick(payload)) => {
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Player {} lagged by {} ticks", joined.player_id, n);
                        // Ticks are full snapshots, skipping is fine
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Closed: no-op if the game loop already closed us
    let _ = app_state
        .game_tx
        .send(GameCommand::Disconnect { conn_id })
        .await;
    tracing::info!("Player {} disconnected", joined.player_id);
}
