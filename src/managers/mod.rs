// WebShield state managers
// Managers handle stateful operations against the database; the rule store
// is the single writer of the rules table.

pub mod rule_store;
