use std::fmt;

use super::rule::RuleId;

// === RuleError ===

/// Errors related to rule store operations.
#[derive(Debug)]
pub enum RuleError {
    /// The pattern matches all traffic (`*` or `**`) and is refused.
    DangerousPattern(String),
    /// Neither a URL filter nor a regex filter was provided.
    EmptyFilter,
    /// Both a URL filter and a regex filter were provided.
    ConflictingFilters,
    /// An explicitly empty resource-type list was provided.
    NoResourceTypes,
    /// Rule with the given id was not found.
    NotFound(RuleId),
    /// Database operation failed.
    DatabaseError(String),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::DangerousPattern(pattern) => {
                write!(f, "Pattern matches all traffic: {}", pattern)
            }
            RuleError::EmptyFilter => write!(f, "Rule has no filter pattern"),
            RuleError::ConflictingFilters => {
                write!(f, "Rule has both a URL filter and a regex filter")
            }
            RuleError::NoResourceTypes => {
                write!(f, "Rule has an empty resource-type list")
            }
            RuleError::NotFound(id) => write!(f, "Rule not found: {}", id),
            RuleError::DatabaseError(msg) => write!(f, "Rule database error: {}", msg),
        }
    }
}

impl std::error::Error for RuleError {}

// === EngineError ===

/// A single rule the engine refused, with its reason.
#[derive(Debug, Clone)]
pub struct RuleRejection {
    pub rule_id: RuleId,
    pub reason: String,
}

/// Errors reported by the external rule-matching engine.
#[derive(Debug)]
pub enum EngineError {
    /// The engine refused some rules; all others were applied.
    RulesRejected(Vec<RuleRejection>),
    /// The engine could not be reached or failed wholesale.
    Unavailable(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::RulesRejected(rejections) => {
                write!(f, "Engine rejected {} rule(s):", rejections.len())?;
                for r in rejections {
                    write!(f, " #{} ({})", r.rule_id, r.reason)?;
                }
                Ok(())
            }
            EngineError::Unavailable(msg) => write!(f, "Engine unavailable: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

// === ImportError ===

/// Errors related to rule import.
#[derive(Debug)]
pub enum ImportError {
    /// The payload is not a well-formed list of rule records.
    MalformedPayload(String),
    /// Two imported records carry the same id.
    DuplicateId(RuleId),
    /// An imported record carries a non-positive id.
    InvalidId(RuleId),
    /// Database operation failed; the store was left untouched.
    DatabaseError(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::MalformedPayload(msg) => {
                write!(f, "Malformed import payload: {}", msg)
            }
            ImportError::DuplicateId(id) => write!(f, "Duplicate imported rule id: {}", id),
            ImportError::InvalidId(id) => write!(f, "Invalid imported rule id: {}", id),
            ImportError::DatabaseError(msg) => write!(f, "Import database error: {}", msg),
        }
    }
}

impl std::error::Error for ImportError {}

// === LogError ===

/// Errors related to the match log and counters.
#[derive(Debug)]
pub enum LogError {
    /// Database operation failed.
    DatabaseError(String),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::DatabaseError(msg) => write!(f, "Log database error: {}", msg),
        }
    }
}

impl std::error::Error for LogError {}

// === AppError ===

/// Unified error for facade intents that touch more than one component.
#[derive(Debug)]
pub enum AppError {
    Rule(RuleError),
    Engine(EngineError),
    Import(ImportError),
    Log(LogError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Rule(e) => write!(f, "{}", e),
            AppError::Engine(e) => write!(f, "{}", e),
            AppError::Import(e) => write!(f, "{}", e),
            AppError::Log(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<RuleError> for AppError {
    fn from(e: RuleError) -> Self {
        AppError::Rule(e)
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(e)
    }
}

impl From<ImportError> for AppError {
    fn from(e: ImportError) -> Self {
        AppError::Import(e)
    }
}

impl From<LogError> for AppError {
    fn from(e: LogError) -> Self {
        AppError::Log(e)
    }
}
