//! In-memory rule engine.
//!
//! Reference implementation of the [`RuleEngine`] seam. Used as the test
//! double for the reconciler and as the default engine in environments
//! without a real matching backend. Matching itself is out of scope; the
//! engine only bookkeeps its active set and buffers emitted notifications.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use crate::types::errors::{EngineError, RuleRejection};
use crate::types::rule::RuleId;

use super::{EngineRule, MatchNotification, RuleDelta, RuleEngine};

/// In-memory engine holding its active set in a `BTreeMap` keyed by rule id.
pub struct MemoryEngine {
    active: BTreeMap<RuleId, EngineRule>,
    pending: VecDeque<MatchNotification>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            active: BTreeMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Seeds the active set directly, bypassing delta validation.
    ///
    /// Simulates pre-existing engine state left over from a previous
    /// installation or crash.
    pub fn seed(&mut self, rules: Vec<EngineRule>) {
        for rule in rules {
            self.active.insert(rule.id, rule);
        }
    }

    /// Queues a match notification as if the given rule had fired.
    pub fn emit_match(&mut self, rule_id: RuleId, url: &str, method: &str) {
        self.pending.push_back(MatchNotification {
            rule_id,
            url: url.to_string(),
            method: method.to_string(),
        });
    }

    /// Ids of the currently active rules, ascending.
    pub fn active_ids(&self) -> Vec<RuleId> {
        self.active.keys().copied().collect()
    }

    /// Validates a rule the way the real engine would on add.
    fn validate(rule: &EngineRule) -> Result<(), String> {
        if rule.condition.pattern().is_none() {
            return Err("rule has no filter pattern".to_string());
        }
        Ok(())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine for MemoryEngine {
    fn get_active_rules(&self) -> Result<Vec<EngineRule>, EngineError> {
        Ok(self.active.values().cloned().collect())
    }

    /// Applies removals, then additions. Rules failing validation are
    /// skipped and reported; every acceptable rule in the delta is applied.
    fn apply_delta(&mut self, delta: RuleDelta) -> Result<(), EngineError> {
        for id in &delta.remove_ids {
            self.active.remove(id);
        }

        let mut rejections = Vec::new();
        for rule in delta.add {
            match Self::validate(&rule) {
                Ok(()) => {
                    self.active.insert(rule.id, rule);
                }
                Err(reason) => rejections.push(RuleRejection {
                    rule_id: rule.id,
                    reason,
                }),
            }
        }

        if rejections.is_empty() {
            Ok(())
        } else {
            Err(EngineError::RulesRejected(rejections))
        }
    }

    fn take_notifications(&mut self) -> Vec<MatchNotification> {
        self.pending.drain(..).collect()
    }
}
