//! Rule store for WebShield.
//!
//! Implements `RuleStoreTrait` — the authoritative mapping from rule id to
//! rule definition, including disabled records, backed by SQLite via
//! `rusqlite`. Owns id allocation: the high-water mark lives in the `meta`
//! table and is bumped in the same transaction that inserts the rule, so a
//! restart can never reuse an id and two interleaved creates can never
//! observe the same mark.

use rusqlite::{params, Connection};

use crate::database::meta;
use crate::types::errors::RuleError;
use crate::types::rule::{
    ActionKind, RedirectTarget, RuleAction, RuleCondition, RuleDraft, RuleId, RulePatch,
    RuleRecord,
};

/// Trait defining rule store operations.
pub trait RuleStoreTrait {
    /// Validates the draft, allocates the next id, and inserts the rule.
    fn create(&mut self, draft: RuleDraft) -> Result<RuleRecord, RuleError>;
    /// Applies a partial update. Returns `false` if the id is unknown.
    fn update(&mut self, id: RuleId, patch: RulePatch) -> Result<bool, RuleError>;
    /// Removes a rule. Returns `false` if the id is unknown.
    fn delete(&mut self, id: RuleId) -> Result<bool, RuleError>;
    /// Flips the enabled flag. Returns `false` if the id is unknown.
    fn set_enabled(&mut self, id: RuleId, enabled: bool) -> Result<bool, RuleError>;
    fn get(&self, id: RuleId) -> Result<Option<RuleRecord>, RuleError>;
    /// All records, disabled included, in stable insertion order.
    fn list(&self) -> Result<Vec<RuleRecord>, RuleError>;
    /// The records that should be active in the engine.
    fn enabled_rules(&self) -> Result<Vec<RuleRecord>, RuleError>;
    fn count(&self) -> Result<usize, RuleError>;
    /// Replaces the whole store in one transaction and reseeds the
    /// high-water mark. Ids in `records` are trusted, not remapped.
    fn replace_all(&mut self, records: &[RuleRecord]) -> Result<(), RuleError>;
    fn high_water_mark(&self) -> Result<RuleId, RuleError>;
    /// Whether the store has ever been seeded (gates first-run migration).
    fn initialized(&self) -> Result<bool, RuleError>;
    fn mark_initialized(&mut self) -> Result<(), RuleError>;
}

/// Rule store backed by a SQLite connection.
pub struct RuleStore<'a> {
    conn: &'a Connection,
}

impl<'a> RuleStore<'a> {
    /// Creates a new `RuleStore` using the provided database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Validates a rule condition against the store's invariants.
    ///
    /// Rejects the unconstrained wildcard, an empty filter, both filters
    /// populated at once, and an explicitly empty resource-type list
    /// (`None` means "all types" and is fine).
    fn validate_condition(condition: &RuleCondition) -> Result<(), RuleError> {
        let url = condition.url_filter.as_deref().filter(|f| !f.is_empty());
        let regex = condition.regex_filter.as_deref().filter(|f| !f.is_empty());

        let pattern = match (url, regex) {
            (Some(_), Some(_)) => return Err(RuleError::ConflictingFilters),
            (None, None) => return Err(RuleError::EmptyFilter),
            (Some(p), None) | (None, Some(p)) => p,
        };

        if pattern == "*" || pattern == "**" {
            return Err(RuleError::DangerousPattern(pattern.to_string()));
        }

        if let Some(types) = &condition.resource_types {
            if types.is_empty() {
                return Err(RuleError::NoResourceTypes);
            }
        }

        Ok(())
    }

    /// Splits an action into its storage columns: (label, redirect url).
    fn action_columns(action: &RuleAction) -> (&'static str, Option<&str>) {
        match action {
            RuleAction::Redirect { redirect } => ("redirect", Some(redirect.url.as_str())),
            other => (other.kind().as_str(), None),
        }
    }

    /// Reassembles an action from its storage columns.
    fn action_from_columns(label: &str, redirect_url: Option<String>) -> RuleAction {
        match ActionKind::parse(label) {
            ActionKind::Redirect => RuleAction::Redirect {
                redirect: RedirectTarget {
                    url: redirect_url.unwrap_or_default(),
                },
            },
            ActionKind::Allow => RuleAction::Allow,
            ActionKind::AllowAllRequests => RuleAction::AllowAllRequests,
            ActionKind::UpgradeScheme => RuleAction::UpgradeScheme,
            ActionKind::Block => RuleAction::Block,
        }
    }

    /// Reads a single rule row into a record.
    fn row_to_rule(row: &rusqlite::Row) -> rusqlite::Result<RuleRecord> {
        let action_type: String = row.get(2)?;
        let redirect_url: Option<String> = row.get(3)?;
        let resource_types: Option<String> = row.get(6)?;
        Ok(RuleRecord {
            id: row.get(0)?,
            priority: row.get(1)?,
            action: Self::action_from_columns(&action_type, redirect_url),
            condition: RuleCondition {
                url_filter: row.get(4)?,
                regex_filter: row.get(5)?,
                resource_types: resource_types
                    .and_then(|json| serde_json::from_str(&json).ok()),
            },
            enabled: row.get::<_, i32>(7)? != 0,
        })
    }

    /// Inserts one record. Used inside create and replace_all transactions.
    fn insert_record(conn: &Connection, record: &RuleRecord) -> Result<(), rusqlite::Error> {
        let (action_type, redirect_url) = Self::action_columns(&record.action);
        let resource_types = match &record.condition.resource_types {
            Some(types) => Some(serde_json::to_string(types).map_err(|e| {
                rusqlite::Error::ToSqlConversionFailure(Box::new(e))
            })?),
            None => None,
        };
        conn.execute(
            "INSERT INTO rules (id, priority, action_type, redirect_url, url_filter, regex_filter, resource_types, enabled) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.priority,
                action_type,
                redirect_url,
                record.condition.url_filter,
                record.condition.regex_filter,
                resource_types,
                record.enabled as i32,
            ],
        )?;
        Ok(())
    }

    fn query_rules(&self, sql: &str) -> Result<Vec<RuleRecord>, RuleError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_rule)
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| RuleError::DatabaseError(e.to_string()))?);
        }
        Ok(results)
    }
}

const RULE_COLUMNS: &str =
    "id, priority, action_type, redirect_url, url_filter, regex_filter, resource_types, enabled";

impl<'a> RuleStoreTrait for RuleStore<'a> {
    /// Creates a new rule from a draft. Returns the stored record with its
    /// assigned id.
    ///
    /// Allocation and insertion share one immediate transaction: the
    /// high-water mark read, its bump, and the row insert all commit or
    /// roll back together.
    fn create(&mut self, draft: RuleDraft) -> Result<RuleRecord, RuleError> {
        Self::validate_condition(&draft.condition)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;

        let last = meta::get_i64(&tx, meta::LAST_RULE_ID, 0)
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        let id = last + 1;
        meta::set_i64(&tx, meta::LAST_RULE_ID, id)
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;

        let record = RuleRecord {
            id,
            priority: draft.priority,
            action: draft.action,
            condition: draft.condition,
            enabled: draft.enabled,
        };
        Self::insert_record(&tx, &record).map_err(|e| RuleError::DatabaseError(e.to_string()))?;

        tx.commit()
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        Ok(record)
    }

    /// Applies a partial update to an existing rule.
    ///
    /// A patched condition is re-validated under the same rules as `create`.
    /// Returns `Ok(false)` when the id is unknown, keeping bulk call sites
    /// idempotent.
    fn update(&mut self, id: RuleId, patch: RulePatch) -> Result<bool, RuleError> {
        let existing = match self.get(id)? {
            Some(record) => record,
            None => return Ok(false),
        };

        let priority = patch.priority.unwrap_or(existing.priority);
        let action = patch.action.unwrap_or(existing.action);
        let condition = patch.condition.unwrap_or(existing.condition);
        Self::validate_condition(&condition)?;

        let (action_type, redirect_url) = Self::action_columns(&action);
        let resource_types = match &condition.resource_types {
            Some(types) => Some(
                serde_json::to_string(types)
                    .map_err(|e| RuleError::DatabaseError(e.to_string()))?,
            ),
            None => None,
        };

        self.conn
            .execute(
                "UPDATE rules SET priority = ?1, action_type = ?2, redirect_url = ?3, \
                 url_filter = ?4, regex_filter = ?5, resource_types = ?6 WHERE id = ?7",
                params![
                    priority,
                    action_type,
                    redirect_url,
                    condition.url_filter,
                    condition.regex_filter,
                    resource_types,
                    id,
                ],
            )
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        Ok(true)
    }

    /// Removes a rule by id. Returns `Ok(false)` when the id is unknown.
    fn delete(&mut self, id: RuleId) -> Result<bool, RuleError> {
        let affected = self
            .conn
            .execute("DELETE FROM rules WHERE id = ?1", params![id])
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        Ok(affected > 0)
    }

    /// Flips the enabled flag without touching the rest of the record.
    fn set_enabled(&mut self, id: RuleId, enabled: bool) -> Result<bool, RuleError> {
        let affected = self
            .conn
            .execute(
                "UPDATE rules SET enabled = ?1 WHERE id = ?2",
                params![enabled as i32, id],
            )
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        Ok(affected > 0)
    }

    fn get(&self, id: RuleId) -> Result<Option<RuleRecord>, RuleError> {
        use rusqlite::OptionalExtension;
        self.conn
            .query_row(
                &format!("SELECT {} FROM rules WHERE id = ?1", RULE_COLUMNS),
                params![id],
                Self::row_to_rule,
            )
            .optional()
            .map_err(|e| RuleError::DatabaseError(e.to_string()))
    }

    /// Lists all records in insertion order (ids are monotonic, so
    /// ascending id is insertion order).
    fn list(&self) -> Result<Vec<RuleRecord>, RuleError> {
        self.query_rules(&format!("SELECT {} FROM rules ORDER BY id", RULE_COLUMNS))
    }

    fn enabled_rules(&self) -> Result<Vec<RuleRecord>, RuleError> {
        self.query_rules(&format!(
            "SELECT {} FROM rules WHERE enabled = 1 ORDER BY id",
            RULE_COLUMNS
        ))
    }

    fn count(&self) -> Result<usize, RuleError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM rules", [], |row| row.get(0))
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        Ok(count as usize)
    }

    /// Replaces the store's contents wholesale.
    ///
    /// All-or-nothing: the delete, every insert, and the high-water-mark
    /// reseed run in a single transaction. The mark only grows: it becomes
    /// `max(previous, largest imported id)` so later creates never collide
    /// with imported ids.
    fn replace_all(&mut self, records: &[RuleRecord]) -> Result<(), RuleError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;

        tx.execute("DELETE FROM rules", [])
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        for record in records {
            Self::insert_record(&tx, record)
                .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        }

        let previous = meta::get_i64(&tx, meta::LAST_RULE_ID, 0)
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        let max_imported = records.iter().map(|r| r.id).max().unwrap_or(0);
        meta::set_i64(&tx, meta::LAST_RULE_ID, previous.max(max_imported))
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;

        tx.commit()
            .map_err(|e| RuleError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    fn high_water_mark(&self) -> Result<RuleId, RuleError> {
        meta::get_i64(self.conn, meta::LAST_RULE_ID, 0)
            .map_err(|e| RuleError::DatabaseError(e.to_string()))
    }

    fn initialized(&self) -> Result<bool, RuleError> {
        meta::get_bool(self.conn, meta::INITIALIZED, false)
            .map_err(|e| RuleError::DatabaseError(e.to_string()))
    }

    fn mark_initialized(&mut self) -> Result<(), RuleError> {
        meta::set_bool(self.conn, meta::INITIALIZED, true)
            .map_err(|e| RuleError::DatabaseError(e.to_string()))
    }
}
