//! Client configuration from environment variables.

use std::env;
use std::time::Duration;

use tracing::warn;

use dobro_shared::constants::{
    DEFAULT_API_URL, DEFAULT_WS_URL, RECONNECT_DELAY_MS, REQUEST_TIMEOUT_MS,
};

/// Runtime configuration for the client.
///
/// Every field has a sane default pointing at a local backend, so
/// `ClientConfig::default()` is enough for development.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the HTTP API (auth and uploads).
    /// Env: `DOBRO_API_URL`. Default: `http://localhost:4000`.
    pub api_url: String,

    /// WebSocket endpoint carrying all realtime traffic.
    /// Env: `DOBRO_WS_URL`. Default: `ws://localhost:4000/ws`.
    pub ws_url: String,

    /// How long a request over the socket waits for its reply.
    /// Env: `DOBRO_REQUEST_TIMEOUT_MS`. Default: 10000.
    pub request_timeout: Duration,

    /// Pause between reconnect attempts after the socket drops.
    /// Env: `DOBRO_RECONNECT_DELAY_MS`. Default: 3000.
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
        }
    }
}

impl ClientConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(val) = env::var("DOBRO_API_URL") {
            cfg.api_url = val;
        }
        if let Ok(val) = env::var("DOBRO_WS_URL") {
            cfg.ws_url = val;
        }
        if let Ok(val) = env::var("DOBRO_REQUEST_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => cfg.request_timeout = Duration::from_millis(ms),
                Err(_) => warn!(value = %val, "invalid DOBRO_REQUEST_TIMEOUT_MS, using default"),
            }
        }
        if let Ok(val) = env::var("DOBRO_RECONNECT_DELAY_MS") {
            match val.parse::<u64>() {
                Ok(ms) => cfg.reconnect_delay = Duration::from_millis(ms),
                Err(_) => warn!(value = %val, "invalid DOBRO_RECONNECT_DELAY_MS, using default"),
            }
        }

        cfg
    }
}
