//! Configuration management
//!
//! Environment-driven, every variable optional with a stated default.
//! `dotenvy` is loaded in `main` before this runs.

use crate::behaviors::BehaviorProfile;
use anyhow::Result;
use std::time::Duration;

/// Agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Game server hostname
    pub server_host: String,

    /// Game server port
    pub server_port: u16,

    /// Account username
    pub username: String,

    /// Credential string sent once on connect (defaults to username)
    pub password: String,

    /// Which behavior set this agent runs
    pub profile: BehaviorProfile,

    /// Delay between a terminal connection event and the next attempt
    pub reconnect_delay: Duration,

    /// Wander scheduling interval
    pub wander_interval: Duration,

    /// How long a random move holds its input, in world ticks
    pub random_move_ticks: u32,

    /// Proximity-jump trigger radius, in blocks (boundary inclusive)
    pub jump_radius: f64,

    /// Proximity-jump check interval
    pub jump_check_interval: Duration,

    /// Harvest scheduling interval
    pub harvest_interval: Duration,

    /// Crop/container search radius, in blocks
    pub harvest_radius: f64,

    /// Aggression scan radius, in blocks
    pub aggression_radius: f64,

    /// Pause at a patrol endpoint before the return leg
    pub patrol_settle: Duration,

    /// Distance between the patrol endpoints, in blocks
    pub patrol_span: f64,

    /// Listen port for the liveness web endpoint
    pub liveness_port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let username = env_str("AGENT_USERNAME", "fieldbot");
        let password = std::env::var("AGENT_PASSWORD").unwrap_or_else(|_| username.clone());

        let profile = env_str("AGENT_PROFILE", "wanderer")
            .parse::<BehaviorProfile>()
            .map_err(|e| anyhow::anyhow!("AGENT_PROFILE: {e}"))?;

        Ok(Self {
            server_host: env_str("GAME_SERVER_HOST", "localhost"),
            server_port: env_parse("GAME_SERVER_PORT", 25565),
            username,
            password,
            profile,
            reconnect_delay: env_millis("RECONNECT_DELAY_MS", 60_000),
            wander_interval: env_millis("WANDER_INTERVAL_MS", 10_000),
            random_move_ticks: env_parse("RANDOM_MOVE_TICKS", 40),
            jump_radius: env_parse("JUMP_RADIUS", 3.0),
            jump_check_interval: env_millis("JUMP_CHECK_INTERVAL_MS", 500),
            harvest_interval: env_millis("HARVEST_INTERVAL_MS", 5_000),
            harvest_radius: env_parse("HARVEST_RADIUS", 16.0),
            aggression_radius: env_parse("AGGRESSION_RADIUS", 16.0),
            patrol_settle: env_millis("PATROL_SETTLE_MS", 1_000),
            patrol_span: env_parse("PATROL_SPAN", 8.0),
            liveness_port: env_parse("LIVENESS_PORT", 20_759),
        })
    }

    /// `host:port` form used for connect attempts and logs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "localhost".to_string(),
            server_port: 25565,
            username: "fieldbot".to_string(),
            password: "fieldbot".to_string(),
            profile: BehaviorProfile::Wanderer,
            reconnect_delay: Duration::from_millis(60_000),
            wander_interval: Duration::from_millis(10_000),
            random_move_ticks: 40,
            jump_radius: 3.0,
            jump_check_interval: Duration::from_millis(500),
            harvest_interval: Duration::from_millis(5_000),
            harvest_radius: 16.0,
            aggression_radius: 16.0,
            patrol_settle: Duration::from_millis(1_000),
            patrol_span: 8.0,
            liveness_port: 20_759,
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_parse(key, default_ms))
}
