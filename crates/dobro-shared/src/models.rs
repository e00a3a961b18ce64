//! Domain model structs shared between the wire layer and the local caches.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be decoded
//! straight from backend replies and handed to an embedding UI layer.
//! Datetime fields stay backend-formatted strings; the client never does
//! arithmetic on them.

use serde::{Deserialize, Serialize};

use crate::types::{ChatId, EventId, EventStatus, Role, TaskId, TaskStatus, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A platform account.  The backend identifies users by an opaque id it
/// serializes as `_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Backend-issued user id.
    #[serde(alias = "_id")]
    pub id: UserId,
    /// Login email, unique per account.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
    /// What the account may do (volunteer, organizer, or both).
    #[serde(default)]
    pub role: Option<Role>,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Postal address.
    #[serde(default)]
    pub address: Option<String>,
    /// Telegram handle.
    #[serde(default)]
    pub telegram_id: Option<String>,
    /// VK profile id.
    #[serde(default)]
    pub vk_id: Option<String>,
    /// When the account was created, backend-formatted.
    #[serde(default)]
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Donation figures attached to an event.  Absent on the wire for events
/// without a fundraising goal; both fields then default to zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Donations {
    #[serde(default)]
    pub raised: f64,
    #[serde(default)]
    pub goal: f64,
}

/// A charity event volunteers can register for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Backend-issued event id.
    #[serde(alias = "_id")]
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Start of the event, backend-formatted.
    pub start_datetime: String,
    /// End of the event, if scheduled.
    #[serde(default)]
    pub end_datetime: Option<String>,
    #[serde(default)]
    pub location: String,
    /// Free-form category label (e.g. "Environment", "Animals").
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: EventStatus,
    /// How many volunteers the organizer is looking for.
    #[serde(default)]
    pub required_volunteers: u32,
    /// Ids of the users currently registered.  The joined count is always
    /// derived from this list, never stored separately.
    #[serde(default)]
    pub volunteers: Vec<UserId>,
    /// Cover photo URL.
    #[serde(default)]
    pub photo_url: Option<String>,
    pub created_by: UserId,
    #[serde(default)]
    pub updated_by: Option<UserId>,
    #[serde(default)]
    pub donations: Donations,
    /// Chat room linked to this event, if one exists.
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    /// URLs of organizer report files uploaded after the event.
    #[serde(default)]
    pub report_files: Vec<String>,
}

impl Event {
    /// Number of volunteers currently registered.
    pub fn joined_count(&self) -> usize {
        self.volunteers.len()
    }

    /// Number of volunteers the organizer asked for.
    pub fn needed(&self) -> u32 {
        self.required_volunteers
    }

    pub fn has_volunteer(&self, user_id: &UserId) -> bool {
        self.volunteers.contains(user_id)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of work an organizer hands to a volunteer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Backend-issued task id.
    #[serde(alias = "_id")]
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Due date, backend-formatted.
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    /// The volunteer this task is assigned to.
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    pub created_by: UserId,
    /// The event this task belongs to, if any.
    #[serde(default)]
    pub event_id: Option<EventId>,
    /// Attachment URLs uploaded for this task.
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub comments: Vec<TaskComment>,
}

/// A comment on a task.  Comments have no id of their own; duplicate
/// suppression compares whole values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskComment {
    /// The task the comment belongs to.  Present on broadcasts so consumers
    /// can drop comments for other tasks.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub user_id: UserId,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A single message in an event chat room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// The room this message belongs to.  Present on broadcasts.
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    /// User id of the sender.
    pub author: UserId,
    /// Message text.
    pub message: String,
    /// When the message was sent, backend-formatted.
    #[serde(default)]
    pub timestamp: Option<String>,
}
