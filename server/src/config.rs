use soccer_shared::config::GameConfig;
use std::path::Path;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub listen_addr: String,
    pub tick_rate_hz: u32,
    pub max_players: usize,
    /// A client has one interval to answer each ping
    pub heartbeat_interval_ms: u64,
    /// Seed for spawn placement
    pub rng_seed: u64,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9001".to_string(),
            tick_rate_hz: 60,
            max_players: 16,
            heartbeat_interval_ms: 5000,
            rng_seed: 42,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        serde_json::from_str(&text).map_err(|e| format!("cannot parse {}: {}", path.display(), e))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err("tick_rate_hz must be in 1..=1000".to_string());
        }
        if self.max_players == 0 {
            return Err("max_players must be > 0".to_string());
        }
        if self.heartbeat_interval_ms == 0 {
            return Err("heartbeat_interval_ms must be > 0".to_string());
        }
        self.listen_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| format!("listen_addr is not a socket address: {}", e))?;
        self.game.validate()
    }

    /// Fixed simulation timestep in seconds
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate_hz as f64
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(self.dt())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Port clients should connect to, derived from `listen_addr`
    pub fn port(&self) -> u16 {
        self.listen_addr
            .parse::<std::net::SocketAddr>()
            .map(|addr| addr.port())
            .unwrap_or(0)
    }
}
