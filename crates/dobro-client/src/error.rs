use dobro_shared::protocol::Action;
use thiserror::Error;

/// Errors surfaced by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Net(#[from] dobro_net::NetError),

    #[error("store error: {0}")]
    Store(#[from] dobro_store::StoreError),

    #[error("protocol error: {0}")]
    Protocol(#[from] dobro_shared::ProtocolError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The HTTP API answered with a non-success status.
    #[error("api rejected the request ({status}): {message}")]
    Api { status: u16, message: String },

    /// The backend answered a socket request with an error envelope.
    #[error("backend rejected {action}: {message}")]
    Backend { action: Action, message: String },

    /// No reply arrived within the configured request timeout.
    #[error("no reply to {action} within the timeout")]
    Timeout { action: Action },

    #[error("not authenticated")]
    NotAuthenticated,
}

pub type Result<T> = std::result::Result<T, ClientError>;
