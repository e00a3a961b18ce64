/// Default base URL for the HTTP API (login, registration, uploads)
pub const DEFAULT_API_URL: &str = "http://localhost:4000";

/// Default WebSocket endpoint for the messaging channel
pub const DEFAULT_WS_URL: &str = "ws://localhost:4000/ws";

/// Delay before a reconnect attempt after the socket closes, in milliseconds
pub const RECONNECT_DELAY_MS: u64 = 3_000;

/// How long a command waits for its reply before giving up, in milliseconds
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Capacity of the connection task's command channel
pub const CHANNEL_CAPACITY: usize = 256;

/// Persisted session keys
pub const KEY_TOKEN: &str = "token";
pub const KEY_USER_ID: &str = "user_id";
pub const KEY_REDIRECT_AFTER_LOGIN: &str = "redirect_after_login";
