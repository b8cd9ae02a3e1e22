//! PhoneProbe Database Layer
//!
//! Provides `SQLite` storage for scan records using `SQLx` with embedded
//! migrations.
//!
//! # Architecture
//!
//! - **Records**: One row per normalized identifier; rescans replace the row
//! - **Schema**: Embedded `SQLx` migrations, checked against the layout the queries need
//! - **Connection Pooling**: Bounded pool, single connection for `:memory:`
//! - **Seam**: [`ScanStore`] is what the orchestrator depends on
//!
//! # Example
//!
//! ```ignore
//! use phoneprobe_db::{Database, ScanStore};
//!
//! let db = Database::new("scans.db").await?;
//! db.run_migrations().await?;
//! let stats = db.aggregate_stats().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod scan_records;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use connection::ScanPool;
pub use error::{DatabaseError, Result};
pub use store::ScanStore;

use std::path::Path;

/// High-level database interface with migrations.
///
/// Wraps a `ScanPool` and implements [`ScanStore`].
#[derive(Debug, Clone)]
pub struct Database {
    pool: ScanPool,
}

impl Database {
    /// Open (or create) the database at `path`.
    ///
    /// # Arguments
    /// * `path` - Path to the database file (or `:memory:` for in-memory)
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = ScanPool::new(path).await?;
        Ok(Self { pool })
    }

    /// Run all pending database migrations and check the resulting schema.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if a migration fails or the
    /// `scan_records` table is not shaped as expected.
    pub async fn run_migrations(&self) -> Result<()> {
        schema::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        schema::applied_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying connection pool.
    ///
    /// This allows direct access to the `SQLx` pool for custom queries.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
