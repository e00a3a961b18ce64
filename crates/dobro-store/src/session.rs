//! Persisted session state: token, user id, redirect path, cached profile.
//!
//! These helpers are the SQLite equivalent of the browser client's
//! localStorage keys.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use dobro_shared::constants::{KEY_REDIRECT_AFTER_LOGIN, KEY_TOKEN, KEY_USER_ID};
use dobro_shared::models::User;
use dobro_shared::types::UserId;

use crate::database::Database;
use crate::error::Result;

impl Database {
    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO session (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM session WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn delete_value(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM session WHERE key = ?1", params![key])?;
        Ok(())
    }

    // --- auth credentials ---

    pub fn set_token(&self, token: &str) -> Result<()> {
        self.set_value(KEY_TOKEN, token)
    }

    pub fn token(&self) -> Result<Option<String>> {
        self.get_value(KEY_TOKEN)
    }

    pub fn set_user_id(&self, user_id: &UserId) -> Result<()> {
        self.set_value(KEY_USER_ID, user_id.as_str())
    }

    pub fn user_id(&self) -> Result<Option<UserId>> {
        Ok(self.get_value(KEY_USER_ID)?.map(UserId::new))
    }

    /// Persist both credentials in one transaction.
    pub fn save_session(&mut self, token: &str, user_id: &UserId) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO session (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![KEY_TOKEN, token, now],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO session (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![KEY_USER_ID, user_id.as_str(), now],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Load both credentials, or `None` when either is missing.
    pub fn load_session(&self) -> Result<Option<(String, UserId)>> {
        match (self.token()?, self.user_id()?) {
            (Some(token), Some(user_id)) => Ok(Some((token, user_id))),
            _ => Ok(None),
        }
    }

    // --- redirect path ---

    /// Remember where to land after the next successful login.
    pub fn set_redirect_after_login(&self, path: &str) -> Result<()> {
        self.set_value(KEY_REDIRECT_AFTER_LOGIN, path)
    }

    /// Read and clear the redirect path in one step.
    pub fn take_redirect_after_login(&self) -> Result<Option<String>> {
        let path = self.get_value(KEY_REDIRECT_AFTER_LOGIN)?;
        if path.is_some() {
            self.delete_value(KEY_REDIRECT_AFTER_LOGIN)?;
        }
        Ok(path)
    }

    // --- cached profile ---

    pub fn cache_profile(&self, user: &User) -> Result<()> {
        let json = serde_json::to_string(user)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO profile_cache (id, json, updated_at) VALUES (1, ?1, ?2)",
            params![json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn cached_profile(&self) -> Result<Option<User>> {
        let json: Option<String> = self
            .conn()
            .query_row("SELECT json FROM profile_cache WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Wipe the whole session table (token, user id, redirect path) and the
    /// cached profile in one transaction.  Logging out must never leave a
    /// partial session behind.
    pub fn clear_session(&mut self) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        tx.execute("DELETE FROM session", [])?;
        tx.execute("DELETE FROM profile_cache", [])?;
        tx.commit()?;
        tracing::debug!("session cleared");
        Ok(())
    }
}
