//! App Core for WebShield.
//!
//! Central struct holding the database, the engine handle, and the
//! services, and exposing the intents the presentation layer calls.
//! Every mutation of the rule store that changes the enabled set triggers
//! reconciliation: toggles via the single-id fast path, create/delete/
//! import via a full resync.

use std::sync::Arc;

use crate::database::Database;
use crate::engine::RuleEngine;
use crate::managers::rule_store::{RuleStore, RuleStoreTrait};
use crate::services::match_aggregator::{MatchAggregator, MatchAggregatorTrait};
use crate::services::reconciler::{Reconciler, ReconcilerTrait};
use crate::services::rule_codec;
use crate::types::errors::{AppError, RuleError};
use crate::types::log::{CounterSnapshot, LogEntry, LogFilter, SessionEvent};
use crate::types::rule::{RuleDraft, RuleId, RulePatch, RuleRecord};

/// Central application struct wiring the store, engine, and services.
///
/// `RuleStore` is created on demand via `db.connection()` because it
/// borrows the connection with a lifetime parameter.
pub struct App<E: RuleEngine> {
    pub db: Arc<Database>,
    pub engine: E,
    pub reconciler: Reconciler,
    pub aggregator: MatchAggregator,
}

impl<E: RuleEngine> App<E> {
    /// Creates a new App over a database file.
    pub fn new(db_path: &str, engine: E) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Database::open(db_path)?;
        Self::with_database(db, engine)
    }

    /// Creates a new App over an already-open database.
    ///
    /// Useful for tests, which pass `Database::open_in_memory()`.
    pub fn with_database(db: Database, engine: E) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(db);
        let reconciler = Reconciler::new(db.clone());
        let aggregator =
            MatchAggregator::new(db.clone()).map_err(|e| format!("Aggregator init failed: {}", e))?;
        Ok(Self {
            db,
            engine,
            reconciler,
            aggregator,
        })
    }

    /// Startup sequence, run unconditionally at every process start:
    /// first-run migration from pre-existing engine state, then a full
    /// resync to repair any drift left by a crash or version skew.
    pub fn startup(&mut self) -> Result<(), AppError> {
        self.reconciler.bootstrap(&mut self.engine)?;
        self.reconciler.resync(&mut self.engine)
    }

    // ─── Rule intents ───

    /// Creates a rule and syncs the engine.
    ///
    /// On an engine rejection the record is still stored; the error tells
    /// the caller, and the next reconciliation trigger retries.
    pub fn create_rule(&mut self, draft: RuleDraft) -> Result<RuleRecord, AppError> {
        let mut store = RuleStore::new(self.db.connection());
        let record = store.create(draft)?;
        self.reconciler.resync(&mut self.engine)?;
        Ok(record)
    }

    /// Updates a rule in place and syncs the engine. Returns `false` when
    /// the id is unknown.
    pub fn update_rule(&mut self, id: RuleId, patch: RulePatch) -> Result<bool, AppError> {
        let mut store = RuleStore::new(self.db.connection());
        let updated = store.update(id, patch)?;
        if updated {
            self.reconciler.resync(&mut self.engine)?;
        }
        Ok(updated)
    }

    /// Deletes a rule and syncs the engine. Returns `false` when the id
    /// is unknown (no-op, not an error).
    pub fn delete_rule(&mut self, id: RuleId) -> Result<bool, AppError> {
        let mut store = RuleStore::new(self.db.connection());
        let deleted = store.delete(id)?;
        if deleted {
            self.reconciler.resync(&mut self.engine)?;
        }
        Ok(deleted)
    }

    /// Flips a rule's enabled flag, applying the single-id engine fast
    /// path. Returns the new enabled state.
    pub fn toggle_rule(&mut self, id: RuleId) -> Result<bool, AppError> {
        let mut store = RuleStore::new(self.db.connection());
        let record = store.get(id)?.ok_or(RuleError::NotFound(id))?;
        let enabled = !record.enabled;
        store.set_enabled(id, enabled)?;
        self.reconciler
            .apply_toggle(&mut self.engine, &record, enabled)?;
        Ok(enabled)
    }

    pub fn list_rules(&self) -> Result<Vec<RuleRecord>, AppError> {
        let store = RuleStore::new(self.db.connection());
        Ok(store.list()?)
    }

    // ─── Import / export ───

    /// Serializes the full store (disabled rules included) to JSON bytes.
    pub fn export_rules(&self) -> Result<Vec<u8>, AppError> {
        let store = RuleStore::new(self.db.connection());
        Ok(rule_codec::export_rules(&store)?)
    }

    /// Replaces the store with an imported rule list and resyncs.
    /// Returns the number of imported rules.
    pub fn import_rules(&mut self, bytes: &[u8]) -> Result<usize, AppError> {
        let mut store = RuleStore::new(self.db.connection());
        let imported = rule_codec::import_rules(&mut store, bytes)?;
        self.reconciler.resync(&mut self.engine)?;
        Ok(imported)
    }

    // ─── Observability intents ───

    /// Drains pending engine notifications into the aggregator.
    /// Returns the number of matches actually recorded (paused matches
    /// are discarded, not recorded).
    pub fn pump_matches(&mut self) -> Result<usize, AppError> {
        let notifications = self.engine.take_notifications();
        let store = RuleStore::new(self.db.connection());
        let mut recorded = 0;
        for notification in &notifications {
            if self.aggregator.record_match(notification, &store)?.is_some() {
                recorded += 1;
            }
        }
        Ok(recorded)
    }

    pub fn handle_session_event(&mut self, event: &SessionEvent) -> Result<(), AppError> {
        Ok(self.aggregator.handle_session_event(event)?)
    }

    /// Pauses or resumes match recording. Returns the new paused state.
    /// Enforcement is unaffected; the engine keeps its active set.
    pub fn toggle_pause(&mut self) -> Result<bool, AppError> {
        Ok(self.aggregator.toggle_pause()?)
    }

    pub fn clear_log(&mut self) -> Result<(), AppError> {
        Ok(self.aggregator.clear_log()?)
    }

    pub fn list_log_entries(&self, filter: LogFilter) -> Result<Vec<LogEntry>, AppError> {
        Ok(self.aggregator.list_log(filter)?)
    }

    pub fn counters(&self) -> Result<CounterSnapshot, AppError> {
        Ok(self.aggregator.counters()?)
    }

    pub fn badge_text(&self) -> String {
        self.aggregator.badge_text()
    }
}
