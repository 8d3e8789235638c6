//! Realtime connection and snapshot API configuration.

use serde::{Deserialize, Serialize};

/// WebSocket session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// `ws://` or `wss://` endpoint of the presence server.
    pub url: String,
    pub connect_timeout_secs: u32,
    pub heartbeat_interval_secs: u32,
    pub reconnect_delay_secs: u32,
    pub max_reconnect_delay_secs: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3005/ws".to_string(),
            connect_timeout_secs: 15,
            heartbeat_interval_secs: 25,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}

/// REST API used to seed the counterpart list on connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u32,
    pub seed_on_connect: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3005/api".to_string(),
            request_timeout_secs: 10,
            seed_on_connect: true,
        }
    }
}
