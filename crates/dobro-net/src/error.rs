use thiserror::Error;

/// Errors produced by the connection layer.
#[derive(Error, Debug)]
pub enum NetError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A send was attempted while the socket was closed or reconnecting.
    #[error("Not connected")]
    NotConnected,

    /// The connection task has shut down.
    #[error("Connection task is gone")]
    ChannelClosed,

    /// Outbound request failed to serialize.
    #[error("Protocol error: {0}")]
    Protocol(#[from] dobro_shared::ProtocolError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
