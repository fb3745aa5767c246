// WebShield shared types
// Plain data structures and error enums used across managers and services.

pub mod errors;
pub mod log;
pub mod rule;
