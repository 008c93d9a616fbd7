use soccer_server::broadcast::GameBroadcast;
use soccer_server::config::ServerConfig;
use soccer_server::game_loop::{run_game_loop, GameCommand};
use soccer_server::ws::{router, AppState};
use soccer_shared::protocol::GameInfo;
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Optional JSON config path as the only argument
    let config = match std::env::args().nth(1) {
        Some(path) => match ServerConfig::from_json_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid server configuration: {}", e);
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();
    let game_info = GameInfo {
        port: config.port(),
        field: config.game.field,
        player_radius: config.game.player.radius,
        ball_radius: config.game.ball.radius,
        goals: config.game.goals,
        tickrate: config.tick_rate_hz,
    };

    let (game_tx, game_rx) = mpsc::channel::<GameCommand>(256);
    let (broadcast_tx, _) = broadcast::channel::<GameBroadcast>(64);

    // Spawn game loop
    let bc_tx = broadcast_tx.clone();
    tokio::spawn(async move {
        run_game_loop(game_rx, bc_tx, config).await;
    });

    let app = router(AppState {
        game_tx,
        broadcast_tx,
        game_info,
    });

    tracing::info!("Starting soccer server on {}", listen_addr);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Cannot listen on {}: {}", listen_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
