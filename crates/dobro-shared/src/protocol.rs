//! Wire protocol for the backend WebSocket channel.
//!
//! Requests go out as `{"topic": ..., "message": {"action": ..., "data": {...}}}`.
//! Replies echo the action with a `status` field, but the backend nests the
//! payload inconsistently across flows (`message.*`, `message.message.*`,
//! `message.data.*`).  [`Inbound::from_json`] flattens every level into one
//! payload map so the typed payload structs below decode from a single shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::models::{ChatMessage, Event, Task, TaskComment, User};
use crate::types::{EventId, UserId};

/// Coarse routing namespace for outbound requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    EventRequests,
    UserRequests,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Operation discriminator carried by every message in both directions.
/// Unknown strings decode to [`Action::Other`] so new backend actions never
/// break parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    GetUpcomingEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    RegisterVolunteer,
    UnregisterVolunteer,
    GetUserEvents,
    GetTasksByUser,
    AssignTask,
    UpdateTask,
    AddTaskComment,
    GetTaskComments,
    AddTaskAttachment,
    GetTaskAttachments,
    GetChatMessages,
    AddChatMessage,
    GetAllUsers,
    UpdateUser,
    VolunteerCount,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::GetUpcomingEvents => "get_upcoming_events",
            Action::CreateEvent => "create_event",
            Action::UpdateEvent => "update_event",
            Action::DeleteEvent => "delete_event",
            Action::RegisterVolunteer => "register_volunteer",
            Action::UnregisterVolunteer => "unregister_volunteer",
            Action::GetUserEvents => "get_user_events",
            Action::GetTasksByUser => "get_tasks_by_user",
            Action::AssignTask => "assign_task",
            Action::UpdateTask => "update_task",
            Action::AddTaskComment => "add_task_comment",
            Action::GetTaskComments => "get_task_comments",
            Action::AddTaskAttachment => "add_task_attachment",
            Action::GetTaskAttachments => "get_task_attachments",
            Action::GetChatMessages => "get_chat_messages",
            Action::AddChatMessage => "add_chat_message",
            Action::GetAllUsers => "get_all_users",
            Action::UpdateUser => "update_user",
            Action::VolunteerCount => "volunteer_count",
            Action::Other(s) => s,
        }
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        match s {
            "get_upcoming_events" => Action::GetUpcomingEvents,
            "create_event" => Action::CreateEvent,
            "update_event" => Action::UpdateEvent,
            "delete_event" => Action::DeleteEvent,
            "register_volunteer" => Action::RegisterVolunteer,
            "unregister_volunteer" => Action::UnregisterVolunteer,
            "get_user_events" => Action::GetUserEvents,
            "get_tasks_by_user" => Action::GetTasksByUser,
            "assign_task" => Action::AssignTask,
            "update_task" => Action::UpdateTask,
            "add_task_comment" => Action::AddTaskComment,
            "get_task_comments" => Action::GetTaskComments,
            "add_task_attachment" => Action::AddTaskAttachment,
            "get_task_attachments" => Action::GetTaskAttachments,
            "get_chat_messages" => Action::GetChatMessages,
            "add_chat_message" => Action::AddChatMessage,
            "get_all_users" => Action::GetAllUsers,
            "update_user" => Action::UpdateUser,
            "volunteer_count" => Action::VolunteerCount,
            other => Action::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Action::from(s.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Outbound requests
// ---------------------------------------------------------------------------

/// An outbound request envelope.  `data` is omitted from the wire when empty
/// (bare requests like `get_all_users` carry only the action).
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub topic: Topic,
    pub action: Action,
    pub data: Option<Value>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    topic: Topic,
    message: EnvelopeMessage<'a>,
}

#[derive(Serialize)]
struct EnvelopeMessage<'a> {
    action: &'a Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
}

impl Request {
    pub fn new(topic: Topic, action: Action) -> Self {
        Self {
            topic,
            action,
            data: None,
        }
    }

    pub fn with_data(
        topic: Topic,
        action: Action,
        data: impl Serialize,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            topic,
            action,
            data: Some(serde_json::to_value(data)?),
        })
    }

    /// Serialize to the JSON text sent as a WebSocket frame.
    pub fn to_text(&self) -> Result<String, ProtocolError> {
        let envelope = Envelope {
            topic: self.topic,
            message: EnvelopeMessage {
                action: &self.action,
                data: self.data.as_ref(),
            },
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

/// A parsed inbound message with its payload flattened to one level.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Topic announced by the backend, when present.
    pub topic: Option<String>,
    pub action: Action,
    /// Raw `status` value (`"success"` / `"error"`), when announced.
    pub status: Option<String>,
    /// Every payload field from every nesting level, deeper levels winning
    /// on key collisions.
    pub payload: Map<String, Value>,
}

impl Inbound {
    /// Parse a raw text frame and flatten the payload.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let root = value.as_object().ok_or(ProtocolError::MalformedEnvelope)?;
        let topic = root
            .get("topic")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let message = root
            .get("message")
            .and_then(Value::as_object)
            .ok_or(ProtocolError::MalformedEnvelope)?;
        let action = message
            .get("action")
            .and_then(Value::as_str)
            .map(Action::from)
            .ok_or(ProtocolError::MissingField("action"))?;

        let mut payload = Map::new();
        let mut status = None;
        flatten_into(&mut payload, &mut status, message);

        Ok(Self {
            topic,
            action,
            status,
            payload,
        })
    }

    /// A reply counts as successful unless it explicitly says otherwise;
    /// broadcast pushes often omit the status field entirely.
    pub fn is_success(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == "success")
    }

    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }

    /// Decode the flattened payload into a typed struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_value(Value::Object(self.payload.clone()))?)
    }

    /// Human-readable text carried by an error reply, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.payload
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| self.payload.get("error").and_then(Value::as_str))
    }
}

/// Collects payload fields from one nesting level, then recurses into
/// `message` / `data` children so deeper levels overwrite outer ones.
fn flatten_into(
    payload: &mut Map<String, Value>,
    status: &mut Option<String>,
    level: &Map<String, Value>,
) {
    let mut nested: Vec<&Map<String, Value>> = Vec::new();
    for (key, value) in level {
        match key.as_str() {
            "action" => {}
            "status" => {
                if status.is_none() {
                    *status = value.as_str().map(str::to_owned);
                }
            }
            "message" | "data" => match value.as_object() {
                Some(inner) => nested.push(inner),
                // e.g. an error reply's `message: "text"`
                None => {
                    payload.insert(key.clone(), value.clone());
                }
            },
            _ => {
                payload.insert(key.clone(), value.clone());
            }
        }
    }
    for inner in nested {
        flatten_into(payload, status, inner);
    }
}

// ---------------------------------------------------------------------------
// Reply payloads
// ---------------------------------------------------------------------------

/// `get_all_users` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListPayload {
    #[serde(default)]
    pub users: Vec<User>,
}

/// `get_upcoming_events` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventListPayload {
    #[serde(default)]
    pub events: Vec<Event>,
}

/// `get_user_events` reply.  Depending on the backend path the events arrive
/// split into created/volunteer lists or as one flat `events` list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserEventsPayload {
    #[serde(default)]
    pub created_events: Vec<Event>,
    #[serde(default)]
    pub volunteer_events: Vec<Event>,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// `create_event` / `update_event` reply.  Some backend paths echo the
/// stored event back, some acknowledge with status only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub event: Option<Event>,
}

/// `update_user` reply.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatedUserPayload {
    pub updated_user: User,
}

/// `register_volunteer` / `unregister_volunteer` / `delete_event` replies.
/// Shapes drift: some echo the ids, some return the whole event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationPayload {
    #[serde(default)]
    pub event_id: Option<EventId>,
    #[serde(default, alias = "_id")]
    pub id: Option<EventId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub event: Option<Event>,
}

impl RegistrationPayload {
    pub fn target_event(&self) -> Option<&EventId> {
        self.event_id.as_ref().or(self.id.as_ref())
    }
}

/// `volunteer_count` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolunteerCountPayload {
    #[serde(default)]
    pub event_id: Option<EventId>,
    #[serde(default)]
    pub count: u32,
}

/// `get_tasks_by_user` reply.  Either pre-split or one flat list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskListPayload {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub assigned_tasks: Vec<Task>,
    #[serde(default)]
    pub created_tasks: Vec<Task>,
}

/// `assign_task` / `update_task` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub task: Option<Task>,
}

/// `get_task_comments` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentListPayload {
    #[serde(default)]
    pub task_id: Option<crate::types::TaskId>,
    #[serde(default)]
    pub comments: Vec<TaskComment>,
}

/// `add_task_comment` broadcast.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentAddedPayload {
    pub comment: TaskComment,
}

/// `get_task_attachments` / `add_task_attachment` replies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentsPayload {
    #[serde(default)]
    pub task_id: Option<crate::types::TaskId>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// `get_chat_messages` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatHistoryPayload {
    #[serde(default)]
    pub chat_id: Option<crate::types::ChatId>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// `add_chat_message` broadcast.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatAppendPayload {
    pub new_message: ChatMessage,
}
