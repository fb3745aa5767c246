//! Engine reconciler for WebShield.
//!
//! Drives the external engine's active rule set to exactly equal the
//! store's enabled records, regardless of whatever state the engine
//! currently holds. Stale rules from a crash, manual tampering, or an
//! upgrade all get repaired the same way.
//!
//! The general algorithm is a full resync rather than an incremental
//! diff: rule counts are small, and targeting the complete desired state
//! makes every run idempotent and retry-safe. Toggles get a single-id
//! fast path whose outcome must be indistinguishable from a full resync.

use std::sync::Arc;

use log::{info, warn};

use crate::database::Database;
use crate::engine::{EngineRule, RuleDelta, RuleEngine};
use crate::managers::rule_store::{RuleStore, RuleStoreTrait};
use crate::types::errors::AppError;
use crate::types::rule::{RuleId, RuleRecord};

/// Trait defining reconciler operations.
pub trait ReconcilerTrait {
    /// Full resync: engine active set := store enabled set.
    fn resync(&self, engine: &mut dyn RuleEngine) -> Result<(), AppError>;
    /// Single-id fast path for an enable/disable flip.
    fn apply_toggle(
        &self,
        engine: &mut dyn RuleEngine,
        record: &RuleRecord,
        enabled: bool,
    ) -> Result<(), AppError>;
    /// First-run migration: seed an uninitialized store from pre-existing
    /// engine state. Returns the number of adopted rules.
    fn bootstrap(&self, engine: &mut dyn RuleEngine) -> Result<usize, AppError>;
}

/// Reconciler backed by the shared database.
pub struct Reconciler {
    db: Arc<Database>,
}

impl Reconciler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ReconcilerTrait for Reconciler {
    /// Makes the engine's active set exactly `{r in store : r.enabled}`.
    ///
    /// Reads the engine's current active ids, projects the store's enabled
    /// records to engine rules (enabled flag stripped), and issues one
    /// delta removing everything currently active and adding everything
    /// desired. Safe to re-run at any time; two runs with no intervening
    /// store change equal one.
    ///
    /// A per-rule engine rejection is returned to the caller but does not
    /// undo the other rules, which the engine has already applied; the
    /// next trigger retries the rejected remainder.
    fn resync(&self, engine: &mut dyn RuleEngine) -> Result<(), AppError> {
        let store = RuleStore::new(self.db.connection());
        let desired: Vec<EngineRule> = store
            .enabled_rules()?
            .iter()
            .map(EngineRule::from)
            .collect();

        let current_ids: Vec<RuleId> = engine
            .get_active_rules()?
            .iter()
            .map(|r| r.id)
            .collect();

        let desired_count = desired.len();
        let result = engine.apply_delta(RuleDelta {
            add: desired,
            remove_ids: current_ids,
        });

        match result {
            Ok(()) => {
                info!("resync complete: {} active rule(s)", desired_count);
                Ok(())
            }
            Err(e) => {
                warn!("resync finished with engine rejections: {}", e);
                Err(e.into())
            }
        }
    }

    /// Applies an enable/disable flip as a minimal delta.
    ///
    /// Disabling removes exactly that id; enabling removes-then-adds
    /// exactly that record so a half-applied earlier state is overwritten.
    fn apply_toggle(
        &self,
        engine: &mut dyn RuleEngine,
        record: &RuleRecord,
        enabled: bool,
    ) -> Result<(), AppError> {
        let delta = if enabled {
            RuleDelta {
                add: vec![EngineRule::from(record)],
                remove_ids: vec![record.id],
            }
        } else {
            RuleDelta {
                add: Vec::new(),
                remove_ids: vec![record.id],
            }
        };
        engine.apply_delta(delta)?;
        Ok(())
    }

    /// Seeds the store from pre-existing engine rules on first run.
    ///
    /// Only acts when the store has never been initialized. Adopted rules
    /// keep their engine ids and come in enabled; the high-water mark is
    /// raised to the largest adopted id. Alien state the engine cannot
    /// report is out of reach; adoption is best-effort, not lossless.
    fn bootstrap(&self, engine: &mut dyn RuleEngine) -> Result<usize, AppError> {
        let mut store = RuleStore::new(self.db.connection());
        if store.initialized()? {
            return Ok(0);
        }

        let preexisting = engine.get_active_rules()?;
        let adopted = preexisting.len();
        if adopted > 0 {
            let records: Vec<RuleRecord> = preexisting
                .into_iter()
                .map(EngineRule::into_record)
                .collect();
            store.replace_all(&records)?;
            info!("adopted {} pre-existing engine rule(s)", adopted);
        }
        store.mark_initialized()?;
        Ok(adopted)
    }
}
