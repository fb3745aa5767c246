//! Import/export codec for WebShield rule lists.
//!
//! Exports the full store (disabled records included) as a pretty JSON
//! array in the record's native wire shape, and imports such an array back
//! by replacing the store wholesale. Imported ids are trusted rather than
//! remapped; the allocator's high-water mark is reseeded past them so
//! later creates cannot collide.

use log::info;

use crate::managers::rule_store::{RuleStore, RuleStoreTrait};
use crate::types::errors::{ImportError, RuleError};
use crate::types::rule::{RuleId, RuleRecord};

/// Serializes the full store to JSON bytes, insertion order (newest last).
///
/// Lossless round-trip target: importing the result into a fresh store
/// yields the same ids, patterns, actions, and enabled flags.
pub fn export_rules(store: &RuleStore<'_>) -> Result<Vec<u8>, RuleError> {
    let records = store.list()?;
    serde_json::to_vec_pretty(&records).map_err(|e| RuleError::DatabaseError(e.to_string()))
}

/// Validates an imported list before it touches the store.
///
/// Shape errors are the parser's job; this checks id sanity: every id
/// positive and no two records sharing one. Pattern validity is left to
/// the engine, whose rejections surface on the post-import resync.
fn validate_import(records: &[RuleRecord]) -> Result<(), ImportError> {
    let mut seen: Vec<RuleId> = Vec::with_capacity(records.len());
    for record in records {
        if record.id <= 0 {
            return Err(ImportError::InvalidId(record.id));
        }
        if seen.contains(&record.id) {
            return Err(ImportError::DuplicateId(record.id));
        }
        seen.push(record.id);
    }
    Ok(())
}

/// Parses and applies an exported rule list, replacing the store wholesale.
///
/// All-or-nothing: a malformed payload or a failed write leaves the store
/// untouched. Records without an `enabled` key come in enabled, so exports
/// produced by the engine's own tooling import cleanly. Returns the number
/// of imported rules; the caller is responsible for triggering a resync.
pub fn import_rules(store: &mut RuleStore<'_>, bytes: &[u8]) -> Result<usize, ImportError> {
    let records: Vec<RuleRecord> = serde_json::from_slice(bytes)
        .map_err(|e| ImportError::MalformedPayload(e.to_string()))?;
    validate_import(&records)?;

    store.replace_all(&records).map_err(|e| match e {
        RuleError::DatabaseError(msg) => ImportError::DatabaseError(msg),
        other => ImportError::DatabaseError(other.to_string()),
    })?;

    info!("imported {} rule(s)", records.len());
    Ok(records.len())
}
