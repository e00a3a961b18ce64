//! Shared application state wiring every component together.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use dobro_net::{spawn_connection, ActionBus, ConnectionConfig, ConnectionHandle};
use dobro_shared::protocol::{Inbound, Request};
use dobro_store::{ChatCache, Database, EventCache, TaskCache, UserCache};

use crate::bridge;
use crate::commands;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpApi;
use crate::session::SessionManager;

/// Everything a running client holds.
///
/// Constructed once by [`AppState::init`]; the embedding application keeps
/// it alive (typically in an `Arc`) and calls the command modules with it.
pub struct AppState {
    pub config: ClientConfig,
    /// Persisted session store.  Behind a mutex: rusqlite connections are
    /// not `Sync`.
    pub db: Arc<Mutex<Database>>,
    /// Per-action fan-out of inbound messages.
    pub bus: Arc<ActionBus>,
    /// Handle to the shared WebSocket connection task.
    pub conn: ConnectionHandle,
    /// Auth and upload endpoints.
    pub http: HttpApi,
    /// Identity and session lifecycle.
    pub session: SessionManager,
    pub events: Arc<EventCache>,
    pub tasks: Arc<TaskCache>,
    pub users: Arc<UserCache>,
    pub chats: Arc<ChatCache>,
}

impl AppState {
    /// Bring the client up with the platform-default database location.
    ///
    /// Spawns the connection task (parked until login) and the cache
    /// bridge, then tries to resume a saved session.  A failed restore is
    /// logged and means "not signed in", never a failed boot.
    pub async fn init(config: ClientConfig) -> Result<Self> {
        let db = Database::open()?;
        Self::wire(config, db).await
    }

    /// Like [`AppState::init`] with an explicit database path.
    pub async fn init_at(config: ClientConfig, db_path: &Path) -> Result<Self> {
        let db = Database::open_at(db_path)?;
        Self::wire(config, db).await
    }

    async fn wire(config: ClientConfig, db: Database) -> Result<Self> {
        let db = Arc::new(Mutex::new(db));
        let bus = Arc::new(ActionBus::new());
        let conn = spawn_connection(
            ConnectionConfig {
                ws_url: config.ws_url.clone(),
                reconnect_delay: config.reconnect_delay,
                auto_reconnect: false,
            },
            bus.clone(),
        );
        let http = HttpApi::new(&config.api_url, config.request_timeout)?;

        let events = Arc::new(EventCache::new());
        let tasks = Arc::new(TaskCache::new());
        let users = Arc::new(UserCache::new());
        let chats = Arc::new(ChatCache::new());

        let session = SessionManager::new(
            db.clone(),
            http.clone(),
            conn.clone(),
            bus.clone(),
            config.request_timeout,
        );

        bridge::spawn_bridge(
            bus.clone(),
            conn.clone(),
            session.clone(),
            events.clone(),
            tasks.clone(),
            users.clone(),
            chats.clone(),
        )
        .await;

        let state = Self {
            config,
            db,
            bus,
            conn,
            http,
            session,
            events,
            tasks,
            users,
            chats,
        };

        if let Err(e) = state.session.restore().await {
            warn!(error = %e, "session restore failed");
        }

        Ok(state)
    }

    /// Send a request and await its reply under the configured timeout.
    pub(crate) async fn request(&self, request: Request) -> Result<Inbound> {
        commands::request_reply(&self.bus, &self.conn, self.config.request_timeout, request).await
    }

    /// Like [`AppState::request`], skipping same-action replies that
    /// `concerns` rejects (they belong to another in-flight caller).
    pub(crate) async fn request_where<F>(&self, request: Request, concerns: F) -> Result<Inbound>
    where
        F: Fn(&Inbound) -> bool,
    {
        commands::request_reply_where(
            &self.bus,
            &self.conn,
            self.config.request_timeout,
            request,
            concerns,
        )
        .await
    }
}
