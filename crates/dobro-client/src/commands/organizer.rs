//! Organizer panel: event lifecycle, task assignment, report uploads.

use serde::Serialize;
use tracing::info;

use dobro_shared::models::{Donations, Event, Task};
use dobro_shared::protocol::{Action, EventPayload, RegistrationPayload, Request, TaskPayload, Topic};
use dobro_shared::types::{EventId, EventStatus, TaskId, TaskStatus, UserId};

use crate::error::{ClientError, Result};
use crate::http::UploadFile;
use crate::state::AppState;

use super::{concerns_event, concerns_task};

/// Fields of a new event as the organizer filled them in.
#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub start_datetime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
    pub location: String,
    pub category: String,
    pub required_volunteers: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donations: Option<Donations>,
}

/// Partial update of an existing event.  Unset fields are left untouched
/// by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventUpdate {
    #[serde(rename = "_id")]
    pub id: EventId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_volunteers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donations: Option<Donations>,
}

impl EventUpdate {
    pub fn new(id: EventId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// A task handed to a volunteer, as the organizer filled it in.
#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
}

/// Partial update of an existing task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdate {
    #[serde(rename = "_id")]
    pub id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserId>,
}

impl TaskUpdate {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

#[derive(Serialize)]
struct CreateEventData<'a> {
    #[serde(flatten)]
    event: &'a NewEvent,
    created_by: &'a UserId,
}

#[derive(Serialize)]
struct UpdateEventData<'a> {
    #[serde(flatten)]
    update: &'a EventUpdate,
    updated_by: &'a UserId,
}

#[derive(Serialize)]
struct DeleteEventData<'a> {
    event_id: &'a EventId,
}

#[derive(Serialize)]
struct AssignTaskData<'a> {
    #[serde(flatten)]
    task: &'a NewTask,
    created_by: &'a UserId,
}

/// Create a new event.  Returns the stored event when the backend echoes
/// it, `None` on a bare acknowledgement.
pub async fn create_event(state: &AppState, event: &NewEvent) -> Result<Option<Event>> {
    let created_by = state
        .session
        .current_user_id()
        .ok_or(ClientError::NotAuthenticated)?;

    let request = Request::with_data(
        Topic::EventRequests,
        Action::CreateEvent,
        CreateEventData {
            event,
            created_by: &created_by,
        },
    )?;
    let reply = state.request(request).await?;

    let payload: EventPayload = reply.decode()?;
    if let Some(ref stored) = payload.event {
        state.events.merge(stored.clone());
        info!(event_id = %stored.id, title = %stored.title, "event created");
    } else {
        info!(title = %event.title, "event created (no echo)");
    }
    Ok(payload.event)
}

/// Apply a partial update to an event.
pub async fn update_event(state: &AppState, update: &EventUpdate) -> Result<Option<Event>> {
    let updated_by = state
        .session
        .current_user_id()
        .ok_or(ClientError::NotAuthenticated)?;

    let request = Request::with_data(
        Topic::EventRequests,
        Action::UpdateEvent,
        UpdateEventData {
            update,
            updated_by: &updated_by,
        },
    )?;
    let reply = state
        .request_where(request, |r| concerns_event(r, &update.id))
        .await?;

    let payload: EventPayload = reply.decode()?;
    if let Some(ref stored) = payload.event {
        state.events.merge(stored.clone());
    }
    info!(event_id = %update.id, "event updated");
    Ok(payload.event)
}

/// Delete an event and drop it from the cache.
pub async fn delete_event(state: &AppState, event_id: &EventId) -> Result<()> {
    let request = Request::with_data(
        Topic::EventRequests,
        Action::DeleteEvent,
        DeleteEventData { event_id },
    )?;
    let reply = state
        .request_where(request, |r| concerns_event(r, event_id))
        .await?;

    let payload: RegistrationPayload = reply.decode().unwrap_or_default();
    let target = payload.target_event().unwrap_or(event_id);
    state.events.remove(target);
    info!(event_id = %event_id, "event deleted");
    Ok(())
}

/// Create a task, optionally already assigned to a volunteer.
pub async fn assign_task(state: &AppState, task: &NewTask) -> Result<Option<Task>> {
    let created_by = state
        .session
        .current_user_id()
        .ok_or(ClientError::NotAuthenticated)?;

    let request = Request::with_data(
        Topic::UserRequests,
        Action::AssignTask,
        AssignTaskData {
            task,
            created_by: &created_by,
        },
    )?;
    let reply = state.request(request).await?;

    let payload: TaskPayload = reply.decode()?;
    if let Some(ref stored) = payload.task {
        state.tasks.merge(stored.clone());
        info!(task_id = %stored.id, "task assigned");
    }
    Ok(payload.task)
}

/// Apply a partial update to a task (status flips, reassignment, edits).
pub async fn update_task(state: &AppState, update: &TaskUpdate) -> Result<Option<Task>> {
    let request = Request::with_data(Topic::UserRequests, Action::UpdateTask, update)?;
    let reply = state
        .request_where(request, |r| concerns_task(r, &update.id))
        .await?;

    let payload: TaskPayload = reply.decode()?;
    if let Some(ref stored) = payload.task {
        state.tasks.merge(stored.clone());
    }
    info!(task_id = %update.id, "task updated");
    Ok(payload.task)
}

/// Upload post-event report files and attach them to the event.
///
/// Two phases: an HTTP multipart upload returns the served URLs, then an
/// `update_event` carries the merged `report_files` list.  Returns the
/// URLs of the newly uploaded files.
pub async fn upload_event_report(
    state: &AppState,
    event_id: &EventId,
    files: Vec<UploadFile>,
) -> Result<Vec<String>> {
    if state.session.current_user_id().is_none() {
        return Err(ClientError::NotAuthenticated);
    }

    let uploaded = state.http.upload_attachments(None, files).await?;

    let mut report_files = state
        .events
        .get(event_id)
        .map(|e| e.report_files)
        .unwrap_or_default();
    for url in &uploaded {
        if !report_files.contains(url) {
            report_files.push(url.clone());
        }
    }

    let update = EventUpdate {
        report_files: Some(report_files),
        ..EventUpdate::new(event_id.clone())
    };
    update_event(state, &update).await?;

    info!(event_id = %event_id, files = uploaded.len(), "event report uploaded");
    Ok(uploaded)
}
