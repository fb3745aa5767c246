// WebShield services
// Services provide the core behavior: engine reconciliation, match-event
// aggregation, and the import/export codec.

pub mod match_aggregator;
pub mod reconciler;
pub mod rule_codec;
