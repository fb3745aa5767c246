use serde::{Deserialize, Serialize};

use super::rule::{ActionKind, RuleId};

/// Maximum number of entries retained in the blocked-request log.
pub const LOG_CAPACITY: usize = 50;

/// One recorded match, enriched with the responsible rule's action.
///
/// Immutable once created; the ring only evicts, never rewrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub domain: String,
    pub url: String,
    pub method: String,
    pub action: ActionKind,
    /// `None` when the match could not be resolved to a stored rule
    /// (deleted after matching, or created outside this store).
    pub rule_id: Option<RuleId>,
    pub timestamp: i64,
}

/// Filter for log listings. `action: None` returns everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFilter {
    pub action: Option<ActionKind>,
}

impl LogFilter {
    pub fn all() -> Self {
        Self { action: None }
    }

    pub fn action(kind: ActionKind) -> Self {
        Self { action: Some(kind) }
    }
}

/// Snapshot of the observability counters and the pause flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub total_blocked: u64,
    pub session_count: u64,
    pub is_paused: bool,
}

/// External browser events that reset the session counter.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The user focused a different tab.
    TabActivated,
    /// A main-frame navigation started on the given URL.
    NavigationStarted { url: String },
}
