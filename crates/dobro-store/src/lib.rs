//! # dobro-store
//!
//! Client-side state for the Dobro application: a SQLite-backed session
//! store (the localStorage analog holding the token, user id and cached
//! profile) plus the in-memory domain caches the bridge task keeps fed
//! from backend replies.
//!
//! The `Database` handle is synchronous and wraps a `rusqlite::Connection`;
//! the caches carry their own locks so they can be shared across tasks.

pub mod chat;
pub mod database;
pub mod events;
pub mod migrations;
pub mod session;
pub mod tasks;
pub mod users;

mod error;

pub use chat::ChatCache;
pub use database::Database;
pub use error::{Result, StoreError};
pub use events::EventCache;
pub use tasks::TaskCache;
pub use users::UserCache;
