//! SQLite storage implementation for marketfeed.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the [`MarketStore`](marketfeed_core::MarketStore) trait defined in
//! `marketfeed-core` and contains:
//! - Database connection pooling and management
//! - Embedded Diesel migrations
//! - A single-writer actor that runs each write job in one transaction
//! - Database-specific model types (with Diesel derives)
//!
//! # Architecture
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//!
//! ```text
//!   core (tasks, calendar)
//!          │
//!          ▼
//!   storage-sqlite (this crate)
//!          │
//!          ▼
//!      SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod market;
pub mod schema;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle, DEFAULT_POOL_SIZE,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use market::MarketRepository;

// Re-export from marketfeed-core for convenience
pub use marketfeed_core::errors::{DatabaseError, Error, Result};
