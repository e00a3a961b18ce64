//! Task drawer: comments and attachments.

use serde::Serialize;
use tracing::info;

use dobro_shared::models::TaskComment;
use dobro_shared::protocol::{
    Action, AttachmentsPayload, CommentAddedPayload, CommentListPayload, Request, Topic,
};
use dobro_shared::types::{TaskId, UserId};

use crate::error::{ClientError, Result};
use crate::http::UploadFile;
use crate::state::AppState;

use super::concerns_task;

#[derive(Serialize)]
struct ByTaskData<'a> {
    task_id: &'a TaskId,
}

#[derive(Serialize)]
struct AddCommentData<'a> {
    task_id: &'a TaskId,
    user_id: &'a UserId,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<String>,
}

#[derive(Serialize)]
struct AddAttachmentData<'a> {
    task_id: &'a TaskId,
    attachments: &'a [String],
}

/// Fetch the comment thread of a task, replacing the cached thread.
pub async fn get_task_comments(state: &AppState, task_id: &TaskId) -> Result<Vec<TaskComment>> {
    let request = Request::with_data(
        Topic::UserRequests,
        Action::GetTaskComments,
        ByTaskData { task_id },
    )?;
    let reply = state
        .request_where(request, |r| concerns_task(r, task_id))
        .await?;

    let payload: CommentListPayload = reply.decode()?;
    state.tasks.set_comments(task_id, payload.comments.clone());
    Ok(payload.comments)
}

/// Post a comment on a task, optionally referencing uploaded files.
///
/// The cached thread grows by what the backend confirmed, not by the
/// locally drafted comment.
pub async fn add_task_comment(
    state: &AppState,
    task_id: &TaskId,
    text: &str,
    attachments: Vec<String>,
) -> Result<TaskComment> {
    let user_id = state
        .session
        .current_user_id()
        .ok_or(ClientError::NotAuthenticated)?;

    let request = Request::with_data(
        Topic::UserRequests,
        Action::AddTaskComment,
        AddCommentData {
            task_id,
            user_id: &user_id,
            text,
            attachments,
        },
    )?;
    let reply = state
        .request_where(request, |r| concerns_task(r, task_id))
        .await?;

    let payload: CommentAddedPayload = reply.decode()?;
    state.tasks.add_comment(task_id, payload.comment.clone());
    info!(task_id = %task_id, "comment added");
    Ok(payload.comment)
}

/// Fetch the attachment URLs of a task, replacing the cached list.
pub async fn get_task_attachments(state: &AppState, task_id: &TaskId) -> Result<Vec<String>> {
    let request = Request::with_data(
        Topic::UserRequests,
        Action::GetTaskAttachments,
        ByTaskData { task_id },
    )?;
    let reply = state
        .request_where(request, |r| concerns_task(r, task_id))
        .await?;

    let payload: AttachmentsPayload = reply.decode()?;
    state
        .tasks
        .set_attachments(task_id, payload.attachments.clone());
    Ok(payload.attachments)
}

/// Upload files for a task and announce them over the socket.
///
/// Two phases: the HTTP multipart upload returns served URLs, then the
/// `add_task_attachment` request carries exactly those URLs so every
/// client (this one included) learns about them from the backend reply.
pub async fn add_task_attachment(
    state: &AppState,
    task_id: &TaskId,
    files: Vec<UploadFile>,
) -> Result<Vec<String>> {
    if state.session.current_user_id().is_none() {
        return Err(ClientError::NotAuthenticated);
    }

    let uploaded = state.http.upload_attachments(Some(task_id), files).await?;

    let request = Request::with_data(
        Topic::UserRequests,
        Action::AddTaskAttachment,
        AddAttachmentData {
            task_id,
            attachments: &uploaded,
        },
    )?;
    let reply = state
        .request_where(request, |r| concerns_task(r, task_id))
        .await?;

    let payload: AttachmentsPayload = reply.decode().unwrap_or_default();
    if payload.attachments.is_empty() {
        state.tasks.add_attachments(task_id, &uploaded);
    } else {
        state.tasks.add_attachments(task_id, &payload.attachments);
    }
    info!(task_id = %task_id, files = uploaded.len(), "attachments added");
    Ok(uploaded)
}
