//! Schema migrations and the `scan_records` layout they must produce.
//!
//! Migrations under `migrations/` are embedded at compile time. After they
//! run, [`verify_scan_records`] checks that the table still matches what the
//! queries in [`crate::scan_records`] rely on: every column, `identifier` as
//! the conflict key for upserts, and the `created_at` index used by history
//! listings.

use crate::error::{DatabaseError, Result};
use sqlx::migrate::Migrator;
use sqlx::SqlitePool;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Columns of `scan_records`, in declaration order.
pub const SCAN_RECORD_COLUMNS: [&str; 7] = [
    "identifier",
    "country_code",
    "probe_results",
    "private_hit_count",
    "success_rate_percent",
    "scan_duration_seconds",
    "created_at",
];

const CREATED_AT_INDEX: &str = "idx_scan_records_created_at";

/// Highest migration version embedded in this build.
#[must_use]
pub fn latest_version() -> i64 {
    MIGRATOR.iter().map(|m| m.version).max().unwrap_or(0)
}

/// Apply pending migrations, then check the resulting `scan_records` layout.
///
/// # Errors
/// Returns `DatabaseError::Migration` if a migration fails or the table does
/// not have the expected shape afterwards.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let before = applied_version(pool).await?;

    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration execution failed: {e}")))?;

    verify_scan_records(pool).await?;

    let after = applied_version(pool).await?;
    if after == before {
        tracing::debug!("Schema already at version {}", after);
    } else {
        tracing::info!("Migrated schema from version {} to {}", before, after);
    }
    Ok(())
}

/// Highest applied migration version, or 0 on a fresh database.
///
/// # Errors
/// Returns `DatabaseError` if the migrations table cannot be queried.
pub async fn applied_version(pool: &SqlitePool) -> Result<i64> {
    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    if tracked == 0 {
        return Ok(0);
    }

    let version: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations WHERE success = 1",
    )
    .fetch_one(pool)
    .await?;
    Ok(version)
}

/// Check that `scan_records` has every expected column, is keyed by
/// `identifier` and carries the `created_at` index.
///
/// # Errors
/// Returns `DatabaseError::Migration` describing the first mismatch.
pub async fn verify_scan_records(pool: &SqlitePool) -> Result<()> {
    let columns: Vec<(String, i64)> =
        sqlx::query_as("SELECT name, pk FROM pragma_table_info('scan_records') ORDER BY cid")
            .fetch_all(pool)
            .await?;

    if columns.is_empty() {
        return Err(schema_error("table scan_records is missing"));
    }

    for expected in SCAN_RECORD_COLUMNS {
        if !columns.iter().any(|(name, _)| name == expected) {
            return Err(schema_error(&format!("scan_records.{expected} is missing")));
        }
    }

    let keys: Vec<&str> = columns
        .iter()
        .filter(|(_, pk)| *pk > 0)
        .map(|(name, _)| name.as_str())
        .collect();
    if keys != ["identifier"] {
        return Err(schema_error(&format!(
            "scan_records must be keyed by identifier alone, found {keys:?}"
        )));
    }

    let indexed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'scan_records' AND name = ?",
    )
    .bind(CREATED_AT_INDEX)
    .fetch_one(pool)
    .await?;
    if indexed == 0 {
        return Err(schema_error(&format!("index {CREATED_AT_INDEX} is missing")));
    }

    Ok(())
}

fn schema_error(detail: &str) -> DatabaseError {
    DatabaseError::Migration(format!("unexpected scan_records schema: {detail}"))
}
