//! Event chat rooms.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info};

use dobro_shared::models::{ChatMessage, Event};
use dobro_shared::protocol::{Action, ChatAppendPayload, ChatHistoryPayload, Request, Topic};
use dobro_shared::types::{ChatId, UserId};

use crate::error::{ClientError, Result};
use crate::state::AppState;

use super::{await_connected, concerns_chat};

#[derive(Serialize)]
struct HistoryData<'a> {
    chat_id: &'a ChatId,
}

#[derive(Serialize)]
struct AppendData<'a> {
    chat_id: &'a ChatId,
    author: &'a UserId,
    message: &'a str,
}

/// One chat room's view: a history fetch guarded to run once, sends, and
/// a transcript read from the cache.
pub struct ChatSession {
    chat_id: ChatId,
    opened: AtomicBool,
}

impl ChatSession {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            opened: AtomicBool::new(false),
        }
    }

    /// The session for an event's chat room, if the event has one.
    pub fn for_event(event: &Event) -> Option<Self> {
        event.chat_id.clone().map(Self::new)
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    /// Fetch the room history into the cache, at most once per session.
    ///
    /// Waits for the socket to come up first, so a session opened while
    /// the connection is still dialing issues its request after the open
    /// instead of losing it.
    pub async fn open(&self, state: &AppState) -> Result<()> {
        if self.opened.swap(true, Ordering::SeqCst) {
            debug!(chat_id = %self.chat_id, "chat already opened");
            return Ok(());
        }
        match self.fetch_history(state).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Allow a retry after a failed open
                self.opened.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn fetch_history(&self, state: &AppState) -> Result<()> {
        await_connected(&state.conn, state.config.request_timeout).await?;

        let request = Request::with_data(
            Topic::UserRequests,
            Action::GetChatMessages,
            HistoryData {
                chat_id: &self.chat_id,
            },
        )?;
        let reply = state
            .request_where(request, |r| concerns_chat(r, &self.chat_id))
            .await?;

        let payload: ChatHistoryPayload = reply.decode()?;
        state.chats.set_messages(&self.chat_id, payload.messages);
        info!(chat_id = %self.chat_id, "chat history loaded");
        Ok(())
    }

    /// Send a message to the room.  The transcript grows by what the
    /// backend confirmed.
    pub async fn send(&self, state: &AppState, text: &str) -> Result<ChatMessage> {
        let author = state
            .session
            .current_user_id()
            .ok_or(ClientError::NotAuthenticated)?;

        let request = Request::with_data(
            Topic::UserRequests,
            Action::AddChatMessage,
            AppendData {
                chat_id: &self.chat_id,
                author: &author,
                message: text,
            },
        )?;
        let reply = state
            .request_where(request, |r| concerns_chat(r, &self.chat_id))
            .await?;

        let payload: ChatAppendPayload = reply.decode()?;
        state.chats.append(&self.chat_id, payload.new_message.clone());
        Ok(payload.new_message)
    }

    /// The cached transcript of this room.
    pub fn transcript(&self, state: &AppState) -> Vec<ChatMessage> {
        state.chats.messages(&self.chat_id)
    }
}
