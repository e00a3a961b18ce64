//! Background bridge from the inbound stream into the caches.
//!
//! Commands merge the replies they awaited themselves; the bridge merges
//! *everything* it sees, so broadcasts triggered by other clients (a new
//! chat message, a comment on a watched task) land in the caches too.
//! All cache merges are idempotent, so the overlap is harmless.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dobro_net::{ActionBus, ConnectionHandle, ConnectionState};
use dobro_shared::models::TaskComment;
use dobro_shared::protocol::{
    Action, AttachmentsPayload, ChatAppendPayload, ChatHistoryPayload, CommentAddedPayload,
    CommentListPayload, EventListPayload, EventPayload, Inbound, RegistrationPayload, Request,
    TaskListPayload, TaskPayload, Topic, UpdatedUserPayload, UserEventsPayload, UserListPayload,
};
use dobro_shared::types::TaskId;
use dobro_store::{ChatCache, EventCache, TaskCache, UserCache};

use crate::session::SessionManager;

struct BridgeState {
    session: SessionManager,
    events: Arc<EventCache>,
    tasks: Arc<TaskCache>,
    users: Arc<UserCache>,
    chats: Arc<ChatCache>,
}

/// Subscribe the caches to the inbound stream and start the directory
/// refresh watcher.  Must run before the first request goes out so no
/// reply can slip past the subscription.
pub(crate) async fn spawn_bridge(
    bus: Arc<ActionBus>,
    conn: ConnectionHandle,
    session: SessionManager,
    events: Arc<EventCache>,
    tasks: Arc<TaskCache>,
    users: Arc<UserCache>,
    chats: Arc<ChatCache>,
) {
    let actions = [
        Action::GetAllUsers,
        Action::UpdateUser,
        Action::GetUpcomingEvents,
        Action::GetUserEvents,
        Action::CreateEvent,
        Action::UpdateEvent,
        Action::DeleteEvent,
        Action::RegisterVolunteer,
        Action::UnregisterVolunteer,
        Action::GetTasksByUser,
        Action::AssignTask,
        Action::UpdateTask,
        Action::GetTaskComments,
        Action::AddTaskComment,
        Action::GetTaskAttachments,
        Action::AddTaskAttachment,
        Action::GetChatMessages,
        Action::AddChatMessage,
    ];
    let rx = bus.subscribe_many(&actions).await;

    let state = BridgeState {
        session,
        events,
        tasks,
        users,
        chats,
    };
    tokio::spawn(inbound_loop(rx, state));
    tokio::spawn(refresh_loop(conn));
}

async fn inbound_loop(mut rx: mpsc::UnboundedReceiver<Inbound>, state: BridgeState) {
    info!("cache bridge running");
    while let Some(inbound) = rx.recv().await {
        if inbound.is_error() {
            debug!(action = %inbound.action, "skipping error reply");
            continue;
        }
        state.apply(inbound);
    }
    warn!("cache bridge stopped");
}

/// Re-issue the user directory request every time the socket comes up.
/// The directory backs name lookups everywhere, so it heals first after
/// a reconnect.
async fn refresh_loop(conn: ConnectionHandle) {
    let mut state_rx = conn.watch_state();
    loop {
        if *state_rx.borrow_and_update() == ConnectionState::Connected {
            debug!("connection up, refreshing user directory");
            let request = Request::new(Topic::UserRequests, Action::GetAllUsers);
            if let Err(e) = conn.send(request).await {
                debug!(error = %e, "directory refresh failed");
            }
        }
        if state_rx.changed().await.is_err() {
            return;
        }
    }
}

fn decode_or_log<T: DeserializeOwned>(inbound: &Inbound) -> Option<T> {
    match inbound.decode() {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(action = %inbound.action, error = %e, "undecodable payload");
            None
        }
    }
}

impl BridgeState {
    fn apply(&self, inbound: Inbound) {
        match inbound.action {
            Action::GetAllUsers => self.merge_directory(&inbound),
            Action::UpdateUser => self.user_updated(&inbound),

            Action::GetUpcomingEvents => {
                let Some(payload) = decode_or_log::<EventListPayload>(&inbound) else {
                    return;
                };
                debug!(events = payload.events.len(), "merging upcoming events");
                self.events.merge_all(payload.events);
            }
            Action::GetUserEvents => {
                let Some(payload) = decode_or_log::<UserEventsPayload>(&inbound) else {
                    return;
                };
                self.events.merge_all(payload.created_events);
                self.events.merge_all(payload.volunteer_events);
                self.events.merge_all(payload.events);
            }
            Action::CreateEvent | Action::UpdateEvent => {
                let Some(payload) = decode_or_log::<EventPayload>(&inbound) else {
                    return;
                };
                if let Some(event) = payload.event {
                    self.events.merge(event);
                }
            }
            Action::DeleteEvent => {
                let Some(payload) = decode_or_log::<RegistrationPayload>(&inbound) else {
                    return;
                };
                match payload.target_event() {
                    Some(event_id) => {
                        self.events.remove(event_id);
                    }
                    None => debug!("delete_event reply without an event id"),
                }
            }
            Action::RegisterVolunteer => self.registration(&inbound, true),
            Action::UnregisterVolunteer => self.registration(&inbound, false),

            Action::GetTasksByUser => {
                let Some(payload) = decode_or_log::<TaskListPayload>(&inbound) else {
                    return;
                };
                self.tasks.merge_all(payload.tasks);
                self.tasks.merge_all(payload.assigned_tasks);
                self.tasks.merge_all(payload.created_tasks);
            }
            Action::AssignTask | Action::UpdateTask => {
                let Some(payload) = decode_or_log::<TaskPayload>(&inbound) else {
                    return;
                };
                if let Some(task) = payload.task {
                    self.tasks.merge(task);
                }
            }
            Action::GetTaskComments => self.comments_fetched(&inbound),
            Action::AddTaskComment => {
                let Some(payload) = decode_or_log::<CommentAddedPayload>(&inbound) else {
                    return;
                };
                let Some(task_id) = payload.comment.task_id.clone() else {
                    debug!("comment broadcast without a task id");
                    return;
                };
                self.tasks.add_comment(&task_id, payload.comment);
            }
            Action::GetTaskAttachments => {
                let Some(payload) = decode_or_log::<AttachmentsPayload>(&inbound) else {
                    return;
                };
                match payload.task_id {
                    Some(task_id) => self.tasks.set_attachments(&task_id, payload.attachments),
                    None => debug!("attachment list without a task id"),
                }
            }
            Action::AddTaskAttachment => {
                let Some(payload) = decode_or_log::<AttachmentsPayload>(&inbound) else {
                    return;
                };
                match payload.task_id {
                    Some(task_id) => self.tasks.add_attachments(&task_id, &payload.attachments),
                    None => debug!("attachment broadcast without a task id"),
                }
            }

            Action::GetChatMessages => {
                let Some(payload) = decode_or_log::<ChatHistoryPayload>(&inbound) else {
                    return;
                };
                let chat_id = payload
                    .chat_id
                    .clone()
                    .or_else(|| payload.messages.iter().find_map(|m| m.chat_id.clone()));
                match chat_id {
                    Some(chat_id) => self.chats.set_messages(&chat_id, payload.messages),
                    None => debug!("chat history without a chat id"),
                }
            }
            Action::AddChatMessage => {
                let Some(payload) = decode_or_log::<ChatAppendPayload>(&inbound) else {
                    return;
                };
                let Some(chat_id) = payload.new_message.chat_id.clone() else {
                    debug!("chat broadcast without a chat id");
                    return;
                };
                self.chats.append(&chat_id, payload.new_message);
            }

            _ => {}
        }
    }

    fn merge_directory(&self, inbound: &Inbound) {
        let Some(payload) = decode_or_log::<UserListPayload>(inbound) else {
            return;
        };

        match self.session.current_user_id() {
            // A boot that could not verify its saved session leaves the
            // credentials in place; the first directory reply that lists
            // the saved id completes the restore.
            None => {
                if let Ok(Some(saved)) = self.session.saved_user_id() {
                    if let Some(me) = payload.users.iter().find(|u| u.id == saved) {
                        match self.session.install(me.clone()) {
                            Ok(()) => info!(user_id = %saved, "session restored from directory"),
                            Err(e) => warn!(error = %e, "failed to adopt restored user"),
                        }
                    }
                }
            }
            // A login that could not reach the directory carries a minimal
            // profile; adopt the directory's record once it differs.
            Some(current) => {
                if let Some(me) = payload.users.iter().find(|u| u.id == current) {
                    if self.session.current_user().as_ref() != Some(me) {
                        match self.session.install(me.clone()) {
                            Ok(()) => debug!(user_id = %current, "profile refreshed from directory"),
                            Err(e) => warn!(error = %e, "failed to refresh stored profile"),
                        }
                    }
                }
            }
        }

        debug!(users = payload.users.len(), "merging user directory");
        self.users.merge_all(payload.users);
    }

    fn user_updated(&self, inbound: &Inbound) {
        let payload: UpdatedUserPayload = match inbound.decode() {
            Ok(p) => p,
            Err(_) => {
                debug!("update_user reply without a user echo");
                return;
            }
        };
        let user = payload.updated_user;
        if self.session.current_user_id().as_ref() == Some(&user.id) {
            if let Err(e) = self.session.install(user.clone()) {
                warn!(error = %e, "failed to refresh stored profile");
            }
        }
        self.users.merge(user);
    }

    fn registration(&self, inbound: &Inbound, joined: bool) {
        let Some(payload) = decode_or_log::<RegistrationPayload>(inbound) else {
            return;
        };
        if let Some(event) = payload.event {
            self.events.merge(event);
            return;
        }
        let (Some(event_id), Some(user_id)) = (payload.target_event(), payload.user_id.as_ref())
        else {
            debug!(action = %inbound.action, "registration reply without ids");
            return;
        };
        if joined {
            self.events.apply_registration(event_id, user_id);
        } else {
            self.events.apply_unregistration(event_id, user_id);
        }
    }

    fn comments_fetched(&self, inbound: &Inbound) {
        let Some(payload) = decode_or_log::<CommentListPayload>(inbound) else {
            return;
        };
        match payload.task_id {
            Some(task_id) => self.tasks.set_comments(&task_id, payload.comments),
            None => {
                // No task id echoed; place comments by their own tag
                let mut by_task: HashMap<TaskId, Vec<TaskComment>> = HashMap::new();
                for comment in payload.comments {
                    if let Some(task_id) = comment.task_id.clone() {
                        by_task.entry(task_id).or_default().push(comment);
                    }
                }
                for (task_id, comments) in by_task {
                    self.tasks.set_comments(&task_id, comments);
                }
            }
        }
    }
}
