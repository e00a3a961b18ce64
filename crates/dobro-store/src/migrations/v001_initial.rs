//! v001 -- Initial schema creation.
//!
//! Creates the two session tables: the `session` key/value store (token,
//! user id, redirect path) and the single-row `profile_cache` holding the
//! signed-in user's profile JSON.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Session key/value store (localStorage analog)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS session (
    key        TEXT PRIMARY KEY NOT NULL,   -- e.g. 'token', 'user_id'
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Cached profile of the signed-in user (single row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profile_cache (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    json       TEXT NOT NULL,               -- serialized User
    updated_at TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
