//! Match-event aggregator for WebShield.
//!
//! Consumes match notifications from the engine and turns them into log
//! entries, counters, and badge text. The engine's notification payload is
//! impoverished (rule id and request only), so each match is enriched by a
//! read-only lookup in the rule store.
//!
//! The session counter lives in memory and is the single source of truth
//! for display; persistence is write-behind of the absolute value and is
//! never read on the increment path. Two overlapping persistence round
//! trips therefore cannot lose an increment the way a read-modify-write
//! of the stored value would.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use rusqlite::params;
use uuid::Uuid;

use crate::database::{meta, Database};
use crate::engine::MatchNotification;
use crate::managers::rule_store::{RuleStore, RuleStoreTrait};
use crate::types::errors::LogError;
use crate::types::log::{CounterSnapshot, LogEntry, LogFilter, SessionEvent, LOG_CAPACITY};
use crate::types::rule::ActionKind;

/// Trait defining match-aggregation operations.
pub trait MatchAggregatorTrait {
    /// Records one match: resolves the action, bumps counters, prepends a
    /// log entry. Returns `None` when recording is paused.
    fn record_match(
        &mut self,
        notification: &MatchNotification,
        store: &RuleStore<'_>,
    ) -> Result<Option<LogEntry>, LogError>;
    /// Handles a browser event that may reset the session counter.
    fn handle_session_event(&mut self, event: &SessionEvent) -> Result<(), LogError>;
    fn reset_session(&mut self) -> Result<(), LogError>;
    fn session_count(&self) -> u64;
    /// Badge label for the current session count: empty at zero, capped
    /// at `999+`.
    fn badge_text(&self) -> String;
    fn is_paused(&self) -> bool;
    fn set_paused(&mut self, paused: bool) -> Result<(), LogError>;
    fn toggle_pause(&mut self) -> Result<bool, LogError>;
    fn counters(&self) -> Result<CounterSnapshot, LogError>;
    /// Newest-first log entries, optionally filtered by action kind.
    fn list_log(&self, filter: LogFilter) -> Result<Vec<LogEntry>, LogError>;
    fn clear_log(&mut self) -> Result<(), LogError>;
}

/// Aggregator backed by the shared database, owning the in-memory session
/// counter cache and the cached paused flag.
pub struct MatchAggregator {
    db: Arc<Database>,
    session_count: u64,
    paused: bool,
}

impl MatchAggregator {
    /// Creates the aggregator, adopting the persisted paused flag and
    /// session mirror so an in-process restart keeps the running session.
    pub fn new(db: Arc<Database>) -> Result<Self, LogError> {
        let conn = db.connection();
        let paused = meta::get_bool(conn, meta::IS_PAUSED, false)
            .map_err(|e| LogError::DatabaseError(e.to_string()))?;
        let session_count = meta::get_i64(conn, meta::SESSION_COUNT, 0)
            .map_err(|e| LogError::DatabaseError(e.to_string()))?
            .max(0) as u64;
        Ok(Self {
            db,
            session_count,
            paused,
        })
    }

    /// Returns the current UNIX timestamp in seconds.
    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Extracts the host part of a URL: scheme, userinfo, port, path, and
    /// query are stripped.
    fn domain_of(url: &str) -> String {
        let rest = url
            .find("://")
            .map(|i| &url[i + 3..])
            .unwrap_or(url);
        let authority = rest
            .split(&['/', '?', '#'][..])
            .next()
            .unwrap_or("");
        let host_port = authority.rsplit('@').next().unwrap_or(authority);
        host_port
            .split(':')
            .next()
            .unwrap_or(host_port)
            .to_string()
    }

    /// Internal pages never reset the session counter.
    fn is_internal_url(url: &str) -> bool {
        url.starts_with("chrome://") || url.starts_with("about:")
    }

    /// Reads a single log row into an entry.
    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LogEntry> {
        let action: String = row.get(4)?;
        Ok(LogEntry {
            id: row.get(0)?,
            domain: row.get(1)?,
            url: row.get(2)?,
            method: row.get(3)?,
            action: ActionKind::parse(&action),
            rule_id: row.get(5)?,
            timestamp: row.get(6)?,
        })
    }
}

impl MatchAggregatorTrait for MatchAggregator {
    /// Records one match notification.
    ///
    /// While paused, the notification is discarded entirely; the engine
    /// still enforced the rule, only observability is suppressed.
    ///
    /// The responsible rule's action is resolved from the store because
    /// the engine's payload does not carry it; a match that no longer
    /// resolves (rule deleted, or foreign to this store) is classified as
    /// a block. The in-memory session counter is bumped before any
    /// persistence; the total counter and the log entry commit in one
    /// transaction, with eviction keeping the newest `LOG_CAPACITY` rows.
    fn record_match(
        &mut self,
        notification: &MatchNotification,
        store: &RuleStore<'_>,
    ) -> Result<Option<LogEntry>, LogError> {
        if self.paused {
            debug!("match on rule {} discarded: paused", notification.rule_id);
            return Ok(None);
        }

        let resolved = store.get(notification.rule_id).ok().flatten();
        let action = resolved
            .as_ref()
            .map(|r| r.action.kind())
            .unwrap_or(ActionKind::Block);
        let rule_id = resolved.as_ref().map(|r| r.id);

        // In-memory first; the mirror write is behind and never read back.
        self.session_count += 1;
        let conn = self.db.connection();
        meta::set_i64(conn, meta::SESSION_COUNT, self.session_count as i64)
            .map_err(|e| LogError::DatabaseError(e.to_string()))?;

        let entry = LogEntry {
            id: Uuid::new_v4().to_string(),
            domain: Self::domain_of(&notification.url),
            url: notification.url.clone(),
            method: notification.method.clone(),
            action,
            rule_id,
            timestamp: Self::now(),
        };

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| LogError::DatabaseError(e.to_string()))?;
        let total = meta::get_i64(&tx, meta::TOTAL_BLOCKED, 0)
            .map_err(|e| LogError::DatabaseError(e.to_string()))?;
        meta::set_i64(&tx, meta::TOTAL_BLOCKED, total + 1)
            .map_err(|e| LogError::DatabaseError(e.to_string()))?;
        tx.execute(
            "INSERT INTO blocked_log (id, domain, url, method, action, rule_id, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                entry.domain,
                entry.url,
                entry.method,
                entry.action.as_str(),
                entry.rule_id,
                entry.timestamp,
            ],
        )
        .map_err(|e| LogError::DatabaseError(e.to_string()))?;
        // Evict beyond capacity, oldest first (insertion order).
        tx.execute(
            "DELETE FROM blocked_log WHERE rowid NOT IN \
             (SELECT rowid FROM blocked_log ORDER BY rowid DESC LIMIT ?1)",
            params![LOG_CAPACITY as i64],
        )
        .map_err(|e| LogError::DatabaseError(e.to_string()))?;
        tx.commit()
            .map_err(|e| LogError::DatabaseError(e.to_string()))?;

        Ok(Some(entry))
    }

    /// Resets the session counter on tab activation and on main-frame
    /// navigation start, except on internal pages.
    fn handle_session_event(&mut self, event: &SessionEvent) -> Result<(), LogError> {
        match event {
            SessionEvent::TabActivated => self.reset_session(),
            SessionEvent::NavigationStarted { url } => {
                if Self::is_internal_url(url) {
                    Ok(())
                } else {
                    self.reset_session()
                }
            }
        }
    }

    /// Zeroes both the in-memory counter and its persisted mirror.
    fn reset_session(&mut self) -> Result<(), LogError> {
        self.session_count = 0;
        meta::set_i64(self.db.connection(), meta::SESSION_COUNT, 0)
            .map_err(|e| LogError::DatabaseError(e.to_string()))
    }

    fn session_count(&self) -> u64 {
        self.session_count
    }

    fn badge_text(&self) -> String {
        match self.session_count {
            0 => String::new(),
            n if n > 999 => "999+".to_string(),
            n => n.to_string(),
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    /// Persists the paused flag immediately so it survives a crash.
    fn set_paused(&mut self, paused: bool) -> Result<(), LogError> {
        meta::set_bool(self.db.connection(), meta::IS_PAUSED, paused)
            .map_err(|e| LogError::DatabaseError(e.to_string()))?;
        self.paused = paused;
        Ok(())
    }

    fn toggle_pause(&mut self) -> Result<bool, LogError> {
        let next = !self.paused;
        self.set_paused(next)?;
        Ok(next)
    }

    fn counters(&self) -> Result<CounterSnapshot, LogError> {
        let total = meta::get_i64(self.db.connection(), meta::TOTAL_BLOCKED, 0)
            .map_err(|e| LogError::DatabaseError(e.to_string()))?;
        Ok(CounterSnapshot {
            total_blocked: total.max(0) as u64,
            session_count: self.session_count,
            is_paused: self.paused,
        })
    }

    /// Lists log entries newest first, optionally filtered by action kind.
    fn list_log(&self, filter: LogFilter) -> Result<Vec<LogEntry>, LogError> {
        let conn = self.db.connection();
        let mut stmt = match filter.action {
            Some(_) => conn.prepare(
                "SELECT id, domain, url, method, action, rule_id, timestamp \
                 FROM blocked_log WHERE action = ?1 ORDER BY rowid DESC",
            ),
            None => conn.prepare(
                "SELECT id, domain, url, method, action, rule_id, timestamp \
                 FROM blocked_log ORDER BY rowid DESC",
            ),
        }
        .map_err(|e| LogError::DatabaseError(e.to_string()))?;

        let rows = match filter.action {
            Some(kind) => stmt.query_map(params![kind.as_str()], Self::row_to_entry),
            None => stmt.query_map([], Self::row_to_entry),
        }
        .map_err(|e| LogError::DatabaseError(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| LogError::DatabaseError(e.to_string()))?);
        }
        Ok(results)
    }

    fn clear_log(&mut self) -> Result<(), LogError> {
        self.db
            .connection()
            .execute("DELETE FROM blocked_log", [])
            .map_err(|e| LogError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
