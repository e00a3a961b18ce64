// WebSocket connection layer: one persistent socket, fanned out by action.

pub mod connection;
pub mod dispatch;
pub mod error;

pub use connection::{
    spawn_connection, ConnectionCommand, ConnectionConfig, ConnectionHandle, ConnectionState,
};
pub use dispatch::ActionBus;
pub use error::{NetError, Result};
