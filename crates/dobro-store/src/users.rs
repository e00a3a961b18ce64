//! In-memory user directory fed by `get_all_users` replies.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use dobro_shared::models::User;
use dobro_shared::types::UserId;

/// Keyed store of every platform user the client has seen.
#[derive(Debug, Default)]
pub struct UserCache {
    users: RwLock<HashMap<UserId, User>>,
}

impl UserCache {
    /// Create a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one user by id.
    pub fn merge(&self, user: User) {
        let mut users = self.users.write();
        debug!(user_id = %user.id, "merging user");
        users.insert(user.id.clone(), user);
    }

    /// Insert or replace a batch of users (a directory reply).
    pub fn merge_all(&self, batch: impl IntoIterator<Item = User>) {
        let mut users = self.users.write();
        for user in batch {
            users.insert(user.id.clone(), user);
        }
    }

    /// Look up a single user.
    pub fn get(&self, user_id: &UserId) -> Option<User> {
        self.users.read().get(user_id).cloned()
    }

    /// Snapshot of the whole directory.
    pub fn all(&self) -> Vec<User> {
        self.users.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    pub fn clear(&self) {
        self.users.write().clear();
    }
}
