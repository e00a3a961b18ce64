//! Persistent WebSocket connection with a tokio mpsc command pattern.
//!
//! The socket lives in a dedicated tokio task. External code talks to it
//! through a cloneable [`ConnectionHandle`] carrying a command channel and
//! a watch on the connection state; every parsed inbound frame fans out
//! through the [`ActionBus`].

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use dobro_shared::constants::{CHANNEL_CAPACITY, DEFAULT_WS_URL, RECONNECT_DELAY_MS};
use dobro_shared::protocol::{Inbound, Request};

use crate::dispatch::ActionBus;
use crate::error::{NetError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Command / state types
// ---------------------------------------------------------------------------

/// Commands sent *into* the connection task.
#[derive(Debug)]
pub enum ConnectionCommand {
    /// Transmit a request on the socket.
    Send(Request),
    /// Enable or disable automatic (re)connection.  Enabling while the
    /// task is parked kicks an immediate dial.
    SetAutoReconnect(bool),
    /// Close the socket and park until reconnection is enabled again.
    Disconnect,
    /// Gracefully shut down the connection task.
    Shutdown,
}

/// Lifecycle state of the shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Configuration for spawning the connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket endpoint to dial.
    pub ws_url: String,
    /// Delay between a close and the next dial when auto-reconnect is on.
    /// Fixed cadence, no backoff.
    pub reconnect_delay: Duration,
    /// Whether to dial without being told to.  Stays off until a user
    /// session is active.
    pub auto_reconnect: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            auto_reconnect: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable handle to the connection task.
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<ConnectionCommand>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Queue a request for transmission.
    ///
    /// Fails fast with [`NetError::NotConnected`] while the socket is down
    /// so callers see the drop instead of losing the frame silently.  A
    /// request can still be lost to the narrow race where the socket dies
    /// after this check; the task logs those.
    pub async fn send(&self, request: Request) -> Result<()> {
        if *self.state_rx.borrow() != ConnectionState::Connected {
            return Err(NetError::NotConnected);
        }
        self.cmd_tx
            .send(ConnectionCommand::Send(request))
            .await
            .map_err(|_| NetError::ChannelClosed)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch for state transitions.  Only real changes notify.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Turn automatic (re)connection on or off.
    pub async fn set_auto_reconnect(&self, enabled: bool) -> Result<()> {
        self.cmd_tx
            .send(ConnectionCommand::SetAutoReconnect(enabled))
            .await
            .map_err(|_| NetError::ChannelClosed)
    }

    /// Close the socket and stay down until reconnection is enabled again.
    pub async fn disconnect(&self) -> Result<()> {
        self.cmd_tx
            .send(ConnectionCommand::Disconnect)
            .await
            .map_err(|_| NetError::ChannelClosed)
    }

    /// Stop the connection task for good.
    pub async fn shutdown(&self) -> Result<()> {
        self.cmd_tx
            .send(ConnectionCommand::Shutdown)
            .await
            .map_err(|_| NetError::ChannelClosed)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Spawn the connection task in the background.
///
/// Returns the handle immediately; the task dials once auto-reconnect is
/// (or becomes) enabled and publishes every parsed inbound message on `bus`.
pub fn spawn_connection(config: ConnectionConfig, bus: Arc<ActionBus>) -> ConnectionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<ConnectionCommand>(CHANNEL_CAPACITY);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    tokio::spawn(connection_loop(config, bus, cmd_rx, state_tx));

    ConnectionHandle { cmd_tx, state_rx }
}

fn set_state(state_tx: &watch::Sender<ConnectionState>, state: ConnectionState) {
    state_tx.send_if_modified(|current| {
        if *current != state {
            *current = state;
            true
        } else {
            false
        }
    });
}

async fn connection_loop(
    config: ConnectionConfig,
    bus: Arc<ActionBus>,
    mut cmd_rx: mpsc::Receiver<ConnectionCommand>,
    state_tx: watch::Sender<ConnectionState>,
) {
    let mut auto_reconnect = config.auto_reconnect;

    loop {
        // --- Parked: wait until reconnection is wanted ---
        if !auto_reconnect {
            set_state(&state_tx, ConnectionState::Disconnected);
            match wait_until_enabled(&mut cmd_rx).await {
                WaitOutcome::Enabled => auto_reconnect = true,
                WaitOutcome::Shutdown => break,
            }
        }

        // --- Dial ---
        let ws = match connect_async(config.ws_url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                warn!(url = %config.ws_url, error = %e, "WebSocket dial failed");
                set_state(&state_tx, ConnectionState::Reconnecting);
                match sleep_before_redial(&mut cmd_rx, config.reconnect_delay).await {
                    RedialOutcome::Redial => continue,
                    RedialOutcome::Park => {
                        auto_reconnect = false;
                        continue;
                    }
                    RedialOutcome::Shutdown => break,
                }
            }
        };

        info!(url = %config.ws_url, "WebSocket connected");
        set_state(&state_tx, ConnectionState::Connected);

        // --- Serve until the socket dies ---
        match serve_socket(ws, &bus, &mut cmd_rx, &mut auto_reconnect).await {
            ServeOutcome::Closed if auto_reconnect => {
                info!(
                    delay_ms = config.reconnect_delay.as_millis() as u64,
                    "Socket closed, reconnecting after delay"
                );
                set_state(&state_tx, ConnectionState::Reconnecting);
                match sleep_before_redial(&mut cmd_rx, config.reconnect_delay).await {
                    RedialOutcome::Redial => {}
                    RedialOutcome::Park => auto_reconnect = false,
                    RedialOutcome::Shutdown => break,
                }
            }
            ServeOutcome::Closed => {
                info!("Socket closed");
            }
            ServeOutcome::Shutdown => break,
        }
    }

    set_state(&state_tx, ConnectionState::Disconnected);
    info!("Connection task terminated");
}

enum ServeOutcome {
    Closed,
    Shutdown,
}

/// Pump commands and socket frames until the socket dies or the task is
/// told to stop.
async fn serve_socket(
    ws: WsStream,
    bus: &ActionBus,
    cmd_rx: &mut mpsc::Receiver<ConnectionCommand>,
    auto_reconnect: &mut bool,
) -> ServeOutcome {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            // --- Outbound commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ConnectionCommand::Send(request)) => {
                        let text = match request.to_text() {
                            Ok(t) => t,
                            Err(e) => {
                                warn!(action = %request.action, error = %e, "Dropping unserializable request");
                                continue;
                            }
                        };
                        debug!(action = %request.action, "Sending request");
                        if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                            warn!(action = %request.action, error = %e, "Send failed, socket is gone");
                            return ServeOutcome::Closed;
                        }
                    }
                    Some(ConnectionCommand::SetAutoReconnect(enabled)) => {
                        *auto_reconnect = enabled;
                    }
                    Some(ConnectionCommand::Disconnect) => {
                        *auto_reconnect = false;
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return ServeOutcome::Closed;
                    }
                    Some(ConnectionCommand::Shutdown) => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        return ServeOutcome::Shutdown;
                    }
                    None => {
                        // All handles dropped
                        return ServeOutcome::Shutdown;
                    }
                }
            }

            // --- Inbound frames ---
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match Inbound::from_json(text.as_str()) {
                            Ok(inbound) => {
                                debug!(action = %inbound.action, status = ?inbound.status, "Inbound message");
                                bus.publish(inbound).await;
                            }
                            // Parse failures are skipped, never fatal
                            Err(e) => warn!(error = %e, "Ignoring unparseable frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!("Server closed the socket");
                        return ServeOutcome::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket read error");
                        return ServeOutcome::Closed;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        return ServeOutcome::Closed;
                    }
                }
            }
        }
    }
}

enum WaitOutcome {
    Enabled,
    Shutdown,
}

/// Park in `Disconnected`, draining commands until reconnection is enabled.
async fn wait_until_enabled(cmd_rx: &mut mpsc::Receiver<ConnectionCommand>) -> WaitOutcome {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            ConnectionCommand::SetAutoReconnect(true) => return WaitOutcome::Enabled,
            ConnectionCommand::SetAutoReconnect(false) | ConnectionCommand::Disconnect => {}
            ConnectionCommand::Send(request) => {
                // Raced past the handle's state check
                warn!(action = %request.action, "Dropping send while disconnected");
            }
            ConnectionCommand::Shutdown => return WaitOutcome::Shutdown,
        }
    }
    WaitOutcome::Shutdown
}

enum RedialOutcome {
    Redial,
    Park,
    Shutdown,
}

/// Sleep out the reconnect delay while still servicing commands.
async fn sleep_before_redial(
    cmd_rx: &mut mpsc::Receiver<ConnectionCommand>,
    delay: Duration,
) -> RedialOutcome {
    let deadline = tokio::time::sleep(delay);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return RedialOutcome::Redial,
            cmd = cmd_rx.recv() => match cmd {
                Some(ConnectionCommand::SetAutoReconnect(true)) => {}
                Some(ConnectionCommand::SetAutoReconnect(false))
                | Some(ConnectionCommand::Disconnect) => return RedialOutcome::Park,
                Some(ConnectionCommand::Send(request)) => {
                    warn!(action = %request.action, "Dropping send while reconnecting");
                }
                Some(ConnectionCommand::Shutdown) | None => return RedialOutcome::Shutdown,
            }
        }
    }
}
