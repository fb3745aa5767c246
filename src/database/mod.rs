//! WebShield database layer.
//!
//! Provides SQLite connection management, schema migrations, and the
//! `meta` key/value accessors used for counters and flags.
//!
//! # Usage
//!
//! ```no_run
//! use webshield::database::Database;
//!
//! // Open a persistent database
//! let db = Database::open("webshield.db").expect("failed to open database");
//!
//! // Or use an in-memory database for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//!
//! // Access the underlying connection for queries
//! let conn = db.connection();
//! ```

pub mod connection;
pub mod meta;
pub mod migrations;

pub use connection::Database;
