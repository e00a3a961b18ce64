//! User-facing operations, grouped by the screen they back.
//!
//! Every operation follows the same request/reply discipline: subscribe to
//! the reply action first, send the request, await the first matching reply
//! under the configured timeout, then decode and merge.  Operations about a
//! specific entity additionally match the id the reply echoes, so two
//! in-flight requests for the same action cannot trade replies.  The shared
//! plumbing lives here; the sub-modules hold the domain calls.

pub mod chat;
pub mod dashboard;
pub mod events;
pub mod organizer;
pub mod tasks;

use std::time::Duration;

use serde_json::Value;

use dobro_net::{ActionBus, ConnectionHandle, ConnectionState, NetError};
use dobro_shared::protocol::{Inbound, Request};
use dobro_shared::types::{ChatId, EventId, TaskId};

use crate::error::{ClientError, Result};

/// Send `request` and wait for the first reply carrying the same action.
pub(crate) async fn request_reply(
    bus: &ActionBus,
    conn: &ConnectionHandle,
    window: Duration,
    request: Request,
) -> Result<Inbound> {
    request_reply_where(bus, conn, window, request, |_| true).await
}

/// Send `request` and wait for the first reply carrying the same action
/// that `concerns` accepts.
///
/// The subscription is registered before the send so a fast backend cannot
/// slip its reply past us.  Two commands can have the same action in
/// flight at once; replies the predicate rejects belong to the other
/// caller and are skipped while the deadline keeps running.  An
/// error-status reply becomes [`ClientError::Backend`]; silence becomes
/// [`ClientError::Timeout`].
pub(crate) async fn request_reply_where<F>(
    bus: &ActionBus,
    conn: &ConnectionHandle,
    window: Duration,
    request: Request,
    concerns: F,
) -> Result<Inbound>
where
    F: Fn(&Inbound) -> bool,
{
    let action = request.action.clone();
    let mut replies = bus.subscribe(action.clone()).await;
    conn.send(request).await?;

    let deadline = tokio::time::Instant::now() + window;
    loop {
        let reply = tokio::time::timeout_at(deadline, replies.recv())
            .await
            .map_err(|_| ClientError::Timeout {
                action: action.clone(),
            })?
            .ok_or(ClientError::Net(NetError::ChannelClosed))?;

        if !concerns(&reply) {
            continue;
        }
        if reply.is_error() {
            let message = reply
                .error_message()
                .unwrap_or("unknown backend error")
                .to_string();
            return Err(ClientError::Backend { action, message });
        }
        return Ok(reply);
    }
}

/// String value at `path` inside the flattened payload, if present.
fn payload_str<'a>(reply: &'a Inbound, path: &[&str]) -> Option<&'a str> {
    let (first, rest) = path.split_first()?;
    let mut value: &Value = reply.payload.get(*first)?;
    for key in rest {
        value = value.get(key)?;
    }
    value.as_str()
}

/// Whether a reply is about `event_id`.  The backend echoes the id under
/// drifting spellings; a reply that echoes none is accepted because the
/// caller cannot tell it apart.
pub(crate) fn concerns_event(reply: &Inbound, event_id: &EventId) -> bool {
    payload_str(reply, &["event_id"])
        .or_else(|| payload_str(reply, &["_id"]))
        .or_else(|| payload_str(reply, &["event", "_id"]))
        .or_else(|| payload_str(reply, &["event", "id"]))
        .map_or(true, |echoed| echoed == event_id.as_str())
}

/// Whether a reply is about `task_id`.
pub(crate) fn concerns_task(reply: &Inbound, task_id: &TaskId) -> bool {
    payload_str(reply, &["task_id"])
        .or_else(|| payload_str(reply, &["comment", "task_id"]))
        .or_else(|| payload_str(reply, &["task", "_id"]))
        .or_else(|| payload_str(reply, &["task", "id"]))
        .map_or(true, |echoed| echoed == task_id.as_str())
}

/// Whether a reply is about `chat_id`.
pub(crate) fn concerns_chat(reply: &Inbound, chat_id: &ChatId) -> bool {
    payload_str(reply, &["chat_id"])
        .or_else(|| payload_str(reply, &["new_message", "chat_id"]))
        .map_or(true, |echoed| echoed == chat_id.as_str())
}

/// Block until the socket reports `Connected`, bounded by `window`.
pub(crate) async fn await_connected(conn: &ConnectionHandle, window: Duration) -> Result<()> {
    let mut state_rx = conn.watch_state();
    tokio::time::timeout(window, async {
        loop {
            if *state_rx.borrow_and_update() == ConnectionState::Connected {
                return Ok(());
            }
            state_rx
                .changed()
                .await
                .map_err(|_| ClientError::Net(NetError::ChannelClosed))?;
        }
    })
    .await
    .map_err(|_| ClientError::Net(NetError::NotConnected))?
}
