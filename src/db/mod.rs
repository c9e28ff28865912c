// src/db/mod.rs
//
// Database module
//
// Provides:
// - Connection pooling
// - Schema migrations
// - Query shaping
// - The persistence context (unit of work with audit stamping)

pub mod change_tracker;
pub mod connection;
pub mod context;
pub mod migrations;
pub mod query;

#[cfg(test)]
pub(crate) mod test_support;

pub use change_tracker::{ChangeTracker, EntityState};

pub use connection::{create_connection_pool, get_connection, ConnectionPool, PooledConn};

pub use context::DbContext;

pub use migrations::{initialize_database, latest_schema_version};

pub use query::{Comparison, Query, QueryInject, SortOrder};
