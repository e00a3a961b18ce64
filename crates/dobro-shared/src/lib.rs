// Domain types and wire protocol shared across the Dobro client crates.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use models::{ChatMessage, Donations, Event, Task, TaskComment, User};
pub use protocol::{Action, Inbound, Request, Topic};
pub use types::{ChatId, EventId, EventStatus, Role, TaskId, TaskStatus, UserId};
