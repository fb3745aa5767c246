//! Typed accessors over the `meta` key/value table.
//!
//! Holds the small persisted state that is not a rule or a log entry:
//! the id high-water mark, the total-blocked counter, the paused flag,
//! the session-counter mirror, and the initialized marker.

use rusqlite::{params, Connection, OptionalExtension};

/// Largest rule id ever allocated.
pub const LAST_RULE_ID: &str = "last_rule_id";
/// Total recorded matches across the lifetime of the installation.
pub const TOTAL_BLOCKED: &str = "total_blocked";
/// While set, matches are not recorded (enforcement continues).
pub const IS_PAUSED: &str = "is_paused";
/// Write-behind mirror of the in-memory session counter.
pub const SESSION_COUNT: &str = "session_count";
/// Set once the store has been seeded; gates first-run migration.
pub const INITIALIZED: &str = "initialized";

/// Reads a raw meta value. `None` if the key was never written.
pub fn get(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

/// Writes a meta value, inserting or replacing.
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Reads an integer meta value, falling back to `default` when absent or unparsable.
pub fn get_i64(conn: &Connection, key: &str, default: i64) -> Result<i64, rusqlite::Error> {
    Ok(get(conn, key)?
        .and_then(|v| v.parse().ok())
        .unwrap_or(default))
}

/// Writes an integer meta value.
pub fn set_i64(conn: &Connection, key: &str, value: i64) -> Result<(), rusqlite::Error> {
    set(conn, key, &value.to_string())
}

/// Reads a boolean meta value, falling back to `default` when absent.
pub fn get_bool(conn: &Connection, key: &str, default: bool) -> Result<bool, rusqlite::Error> {
    Ok(get(conn, key)?.map(|v| v == "1").unwrap_or(default))
}

/// Writes a boolean meta value.
pub fn set_bool(conn: &Connection, key: &str, value: bool) -> Result<(), rusqlite::Error> {
    set(conn, key, if value { "1" } else { "0" })
}
