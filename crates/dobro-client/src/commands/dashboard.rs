//! Personal dashboard: my events, my tasks, profile edits.

use serde::Serialize;
use tracing::info;

use dobro_shared::models::{Event, Task, User};
use dobro_shared::protocol::{
    Action, Request, TaskListPayload, Topic, UpdatedUserPayload, UserEventsPayload,
};
use dobro_shared::types::{Role, UserId};

use crate::error::{ClientError, Result};
use crate::state::AppState;

/// The current user's events, split the way the dashboard shows them.
#[derive(Debug, Clone, Default)]
pub struct UserEventsSummary {
    pub created: Vec<Event>,
    pub volunteering: Vec<Event>,
}

/// The current user's tasks, split by relationship.
#[derive(Debug, Clone, Default)]
pub struct TasksSummary {
    pub assigned: Vec<Task>,
    pub created: Vec<Task>,
}

/// Profile fields a user can edit.  Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vk_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Serialize)]
struct ByUserData<'a> {
    user_id: &'a UserId,
}

#[derive(Serialize)]
struct UpdateUserData<'a> {
    #[serde(rename = "_id")]
    id: &'a UserId,
    #[serde(flatten)]
    update: &'a ProfileUpdate,
}

/// Fetch the events the current user created or volunteers for.
///
/// Whatever shape the reply takes (pre-split lists or one flat list), the
/// events land in the cache and the summary is derived from it, so the
/// split can never disagree with what the rest of the app sees.
pub async fn get_user_events(state: &AppState) -> Result<UserEventsSummary> {
    let user_id = state
        .session
        .current_user_id()
        .ok_or(ClientError::NotAuthenticated)?;

    let request = Request::with_data(
        Topic::EventRequests,
        Action::GetUserEvents,
        ByUserData { user_id: &user_id },
    )?;
    let reply = state.request(request).await?;

    let payload: UserEventsPayload = reply.decode()?;
    state.events.merge_all(payload.created_events);
    state.events.merge_all(payload.volunteer_events);
    state.events.merge_all(payload.events);

    Ok(UserEventsSummary {
        created: state.events.created_by(&user_id),
        volunteering: state.events.volunteering(&user_id),
    })
}

/// Fetch the tasks assigned to or created by the current user.
pub async fn get_tasks_by_user(state: &AppState) -> Result<TasksSummary> {
    let user_id = state
        .session
        .current_user_id()
        .ok_or(ClientError::NotAuthenticated)?;

    let request = Request::with_data(
        Topic::UserRequests,
        Action::GetTasksByUser,
        ByUserData { user_id: &user_id },
    )?;
    let reply = state.request(request).await?;

    let payload: TaskListPayload = reply.decode()?;
    state.tasks.merge_all(payload.tasks);
    state.tasks.merge_all(payload.assigned_tasks);
    state.tasks.merge_all(payload.created_tasks);

    Ok(TasksSummary {
        assigned: state.tasks.assigned_to(&user_id),
        created: state.tasks.created_by(&user_id),
    })
}

/// Update the current user's profile and refresh the stored identity.
pub async fn update_profile(state: &AppState, update: &ProfileUpdate) -> Result<User> {
    let user_id = state
        .session
        .current_user_id()
        .ok_or(ClientError::NotAuthenticated)?;

    let request = Request::with_data(
        Topic::UserRequests,
        Action::UpdateUser,
        UpdateUserData {
            id: &user_id,
            update,
        },
    )?;
    let reply = state.request(request).await?;

    let payload: UpdatedUserPayload = reply.decode()?;
    let user = payload.updated_user;
    state.users.merge(user.clone());
    if user.id == user_id {
        state.session.install(user.clone())?;
    }
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}
