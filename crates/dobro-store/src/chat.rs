//! In-memory chat transcripts, one per event chat room.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use dobro_shared::models::ChatMessage;
use dobro_shared::types::ChatId;

/// Transcripts keyed by chat room.  History replies replace a room's
/// transcript; send broadcasts append with duplicate suppression.
#[derive(Debug, Default)]
pub struct ChatCache {
    chats: RwLock<HashMap<ChatId, Vec<ChatMessage>>>,
}

impl ChatCache {
    /// Create a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a room's transcript (a `get_chat_messages` reply).
    pub fn set_messages(&self, chat_id: &ChatId, messages: Vec<ChatMessage>) {
        let mut chats = self.chats.write();
        debug!(chat_id = %chat_id, count = messages.len(), "replacing transcript");
        chats.insert(chat_id.clone(), messages);
    }

    /// Append a broadcast message, creating the room if needed.  Exact
    /// duplicates are dropped.  Returns whether the message was added.
    pub fn append(&self, chat_id: &ChatId, message: ChatMessage) -> bool {
        let mut chats = self.chats.write();
        let transcript = chats.entry(chat_id.clone()).or_default();
        if transcript.contains(&message) {
            return false;
        }
        transcript.push(message);
        true
    }

    /// Snapshot of a room's transcript, oldest first.
    pub fn messages(&self, chat_id: &ChatId) -> Vec<ChatMessage> {
        self.chats.read().get(chat_id).cloned().unwrap_or_default()
    }

    /// Rooms with at least one cached message.
    pub fn rooms(&self) -> Vec<ChatId> {
        self.chats.read().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.chats.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dobro_shared::types::UserId;

    fn test_message(chat_id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            chat_id: Some(ChatId::new(chat_id)),
            author: UserId::new("u1"),
            message: text.to_string(),
            timestamp: Some("2025-06-01T10:00:00Z".to_string()),
        }
    }

    #[test]
    fn history_replaces_transcript() {
        let cache = ChatCache::new();
        let chat_id = ChatId::new("c1");

        cache.set_messages(&chat_id, vec![test_message("c1", "old")]);
        cache.set_messages(
            &chat_id,
            vec![test_message("c1", "one"), test_message("c1", "two")],
        );

        let transcript = cache.messages(&chat_id);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].message, "one");
    }

    #[test]
    fn append_creates_the_room() {
        let cache = ChatCache::new();
        let chat_id = ChatId::new("c1");

        assert!(cache.append(&chat_id, test_message("c1", "hi")));
        assert_eq!(cache.messages(&chat_id).len(), 1);
        assert_eq!(cache.rooms(), vec![chat_id]);
    }

    #[test]
    fn duplicate_broadcast_is_dropped() {
        let cache = ChatCache::new();
        let chat_id = ChatId::new("c1");
        let message = test_message("c1", "hi");

        assert!(cache.append(&chat_id, message.clone()));
        assert!(!cache.append(&chat_id, message));
        assert_eq!(cache.messages(&chat_id).len(), 1);
    }

    #[test]
    fn unknown_room_reads_empty() {
        let cache = ChatCache::new();
        assert!(cache.messages(&ChatId::new("nowhere")).is_empty());
    }
}
