//! In-memory event cache fed by backend replies.
//!
//! One instance is shared between the bridge task (writer) and the command
//! modules (readers), so the lock lives inside the cache.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use dobro_shared::models::Event;
use dobro_shared::types::{EventId, UserId};

/// Keyed store of every event the client has seen.  All merges are
/// idempotent: replaying the same reply leaves the cache unchanged.
#[derive(Debug, Default)]
pub struct EventCache {
    events: RwLock<HashMap<EventId, Event>>,
}

impl EventCache {
    /// Create a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one event by id.
    pub fn merge(&self, event: Event) {
        let mut events = self.events.write();
        debug!(event_id = %event.id, "merging event");
        events.insert(event.id.clone(), event);
    }

    /// Insert or replace a batch of events.
    pub fn merge_all(&self, batch: impl IntoIterator<Item = Event>) {
        let mut events = self.events.write();
        for event in batch {
            events.insert(event.id.clone(), event);
        }
    }

    /// Drop an event (e.g. after a `delete_event` success).
    pub fn remove(&self, event_id: &EventId) -> bool {
        let removed = self.events.write().remove(event_id).is_some();
        if removed {
            debug!(event_id = %event_id, "removed event");
        }
        removed
    }

    /// Add `user_id` to the event's volunteer list.  Adding twice is a
    /// no-op; the joined count is derived from the list so it cannot drift.
    pub fn apply_registration(&self, event_id: &EventId, user_id: &UserId) {
        let mut events = self.events.write();
        if let Some(event) = events.get_mut(event_id) {
            if !event.volunteers.contains(user_id) {
                event.volunteers.push(user_id.clone());
                debug!(event_id = %event_id, user_id = %user_id, "volunteer registered");
            }
        }
    }

    /// Remove `user_id` from the event's volunteer list.  Removing an
    /// absent id is a no-op; the count floors at zero.
    pub fn apply_unregistration(&self, event_id: &EventId, user_id: &UserId) {
        let mut events = self.events.write();
        if let Some(event) = events.get_mut(event_id) {
            let before = event.volunteers.len();
            event.volunteers.retain(|v| v != user_id);
            if event.volunteers.len() < before {
                debug!(event_id = %event_id, user_id = %user_id, "volunteer unregistered");
            }
        }
    }

    /// Look up a single event.
    pub fn get(&self, event_id: &EventId) -> Option<Event> {
        self.events.read().get(event_id).cloned()
    }

    /// Snapshot of all cached events.
    pub fn all(&self) -> Vec<Event> {
        self.events.read().values().cloned().collect()
    }

    /// Events in a category, for the browse view.
    pub fn by_category(&self, category: &str) -> Vec<Event> {
        self.events
            .read()
            .values()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }

    /// Case-insensitive title search.
    pub fn search(&self, query: &str) -> Vec<Event> {
        let query = query.to_lowercase();
        self.events
            .read()
            .values()
            .filter(|e| e.title.to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    /// Events created by a user.
    pub fn created_by(&self, user_id: &UserId) -> Vec<Event> {
        self.events
            .read()
            .values()
            .filter(|e| &e.created_by == user_id)
            .cloned()
            .collect()
    }

    /// Events a user is registered for.
    pub fn volunteering(&self, user_id: &UserId) -> Vec<Event> {
        self.events
            .read()
            .values()
            .filter(|e| e.has_volunteer(user_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }
}
