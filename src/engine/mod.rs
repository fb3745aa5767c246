//! Seam to the external rule-matching engine.
//!
//! The engine is an opaque black box: it holds a flat set of active rules,
//! accepts bulk add/remove deltas, and emits match notifications. It has no
//! concept of disabled rules or provenance; keeping the richer store in
//! sync with it is the reconciler's job.

pub mod memory;

use crate::types::errors::EngineError;
use crate::types::rule::{RuleAction, RuleCondition, RuleId, RuleRecord};

pub use memory::MemoryEngine;

/// A rule as the engine sees it: the stored record with the UI-only
/// `enabled` flag stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRule {
    pub id: RuleId,
    pub priority: i32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl From<&RuleRecord> for EngineRule {
    fn from(record: &RuleRecord) -> Self {
        Self {
            id: record.id,
            priority: record.priority,
            action: record.action.clone(),
            condition: record.condition.clone(),
        }
    }
}

impl EngineRule {
    /// Lifts an engine rule back into a store record. Used by first-run
    /// migration, which adopts pre-existing engine state as enabled rules.
    pub fn into_record(self) -> RuleRecord {
        RuleRecord {
            id: self.id,
            priority: self.priority,
            action: self.action,
            condition: self.condition,
            enabled: true,
        }
    }
}

/// A bulk change to the engine's active set. Removals apply before
/// additions, so removing and re-adding the same id is an update.
#[derive(Debug, Clone, Default)]
pub struct RuleDelta {
    pub add: Vec<EngineRule>,
    pub remove_ids: Vec<RuleId>,
}

/// An asynchronous match event from the engine. The payload is
/// impoverished on purpose: the engine reports which rule fired and what
/// request it fired on, nothing more.
#[derive(Debug, Clone)]
pub struct MatchNotification {
    pub rule_id: RuleId,
    pub url: String,
    pub method: String,
}

/// Interface to the external rule-matching engine.
pub trait RuleEngine {
    /// Returns the engine's current active rules.
    fn get_active_rules(&self) -> Result<Vec<EngineRule>, EngineError>;

    /// Applies a bulk delta. Rules the engine refuses are reported via
    /// `EngineError::RulesRejected`; all acceptable rules in the same
    /// delta are still applied.
    fn apply_delta(&mut self, delta: RuleDelta) -> Result<(), EngineError>;

    /// Drains pending match notifications, oldest first. Delivery has no
    /// ordering guarantee relative to store mutations.
    fn take_notifications(&mut self) -> Vec<MatchNotification>;
}
