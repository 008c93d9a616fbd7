//! Load test for the soccer server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect to the server and wait for `init`
//! - Answer every `ping` with `pong`
//! - Periodically send random `controls`
//! - Count `tick` broadcasts
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N       Number of clients to spawn (default: 16)
//!   --duration S      Test duration in seconds (default: 30)
//!   --control-rate R  Control changes per second per client (default: 4)
//!   --url URL         Server URL (default: ws://127.0.0.1:9001/ws)

use futures_util::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use soccer_shared::protocol::{ClientMsg, Controls, ServerMsg};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    refused: AtomicU64,
    ticks_received: AtomicU64,
    pings_answered: AtomicU64,
    controls_sent: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

fn encode(msg: &ClientMsg) -> Option<Message> {
    serde_json::to_string(msg).ok().map(|json| Message::Text(json.into()))
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    control_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();
    let (mut ws, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    // Wait for init; a close here means the server is full
    let init = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Ok(ServerMsg::Init(id)) = serde_json::from_str::<ServerMsg>(&text) {
                        return Some(id);
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => {}
            }
        }
        None
    })
    .await;

    let player_id = match init {
        Ok(Some(id)) => id,
        Ok(None) => {
            metrics.refused.fetch_add(1, Ordering::Relaxed);
            return;
        }
        Err(_) => {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    metrics
        .latency_sum_ms
        .fetch_add(connect_start.elapsed().as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    if client_id < 3 {
        eprintln!("Client {} playing as {}", client_id, player_id);
    }
    if let Some(msg) = encode(&ClientMsg::SetName(format!("bot-{}", client_id))) {
        let _ = ws.send(msg).await;
    }

    let control_interval = if control_rate > 0.0 {
        Duration::from_secs_f64(1.0 / control_rate)
    } else {
        Duration::from_secs(3600)
    };
    let mut control_timer = tokio::time::interval(control_interval);
    control_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut rng = ChaCha8Rng::seed_from_u64(client_id as u64);
    let test_end = tokio::time::sleep(duration);
    tokio::pin!(test_end);

    loop {
        tokio::select! {
            _ = &mut test_end => break,

            _ = control_timer.tick() => {
                let controls = Controls {
                    up: rng.gen_bool(0.3),
                    down: rng.gen_bool(0.3),
                    left: rng.gen_bool(0.3),
                    right: rng.gen_bool(0.3),
                };
                let Some(msg) = encode(&ClientMsg::Controls(controls)) else { continue };
                if ws.send(msg).await.is_err() {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                metrics.controls_sent.fetch_add(1, Ordering::Relaxed);
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMsg>(&text) {
                        Ok(ServerMsg::Tick(_)) => {
                            metrics.ticks_received.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(ServerMsg::Ping(_)) => {
                            let Some(pong) = encode(&ClientMsg::Pong) else { continue };
                            if ws.send(pong).await.is_err() {
                                metrics.errors.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            metrics.pings_answered.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(ServerMsg::Init(_)) => {}
                        Err(_) => {
                            metrics.errors.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        if client_id < 3 {
                            eprintln!("Client {} got Close: {:?}", client_id, frame);
                        }
                        break;
                    }
                    None => break,
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 16;
    let mut duration_secs: u64 = 30;
    let mut control_rate: f64 = 4.0;
    let mut url = "ws://127.0.0.1:9001/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(16);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--control-rate" => {
                i += 1;
                control_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(4.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Soccer Server Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Control rate: {}/s per client", control_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);
    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(async move {
            run_client(client_id, url, control_rate, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();
        loop {
            interval.tick().await;
            println!(
                "[{:3}s] connected={}, ticks={}, pongs={}, controls={}, errors={}",
                start.elapsed().as_secs(),
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.ticks_received.load(Ordering::Relaxed),
                metrics_clone.pings_answered.load(Ordering::Relaxed),
                metrics_clone.controls_sent.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
    stats_handle.abort();

    let ticks = metrics.ticks_received.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);
    let played = latency_count.max(1);

    println!();
    println!("=== Final Results ===");
    println!("Clients admitted: {}", latency_count);
    println!("Clients refused: {}", metrics.refused.load(Ordering::Relaxed));
    println!("Total ticks received: {}", ticks);
    println!(
        "Ticks per client per second: {:.1}",
        ticks as f64 / played as f64 / duration_secs.max(1) as f64
    );
    println!(
        "Avg time to init: {}ms",
        metrics.latency_sum_ms.load(Ordering::Relaxed) / played
    );
    println!("Pings answered: {}", metrics.pings_answered.load(Ordering::Relaxed));
    println!("Errors: {}", metrics.errors.load(Ordering::Relaxed));
}
