//! Scan record operations.
//!
//! This module provides CRUD operations for the `scan_records` table, which
//! holds one aggregated scan outcome per normalized phone identifier. Probe
//! results are stored as a JSON array in declaration order.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use phoneprobe_core::{Identifier, ProbeResult, ScanRecord, ScanStats};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const SELECT_COLUMNS: &str = "SELECT identifier, country_code, probe_results, private_hit_count, success_rate_percent, scan_duration_seconds, created_at FROM scan_records";

/// Insert a scan record, fully replacing any record with the same identifier.
///
/// Applying the same record twice leaves the table in the same state.
///
/// # Errors
/// Returns `DatabaseError` if serialization or the upsert fails.
pub async fn upsert(pool: &SqlitePool, record: &ScanRecord) -> Result<()> {
    let probe_results = serde_json::to_string(&record.probe_results)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    sqlx::query(
        r"
        INSERT INTO scan_records (
            identifier, country_code, probe_results, private_hit_count,
            success_rate_percent, scan_duration_seconds, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(identifier) DO UPDATE SET
            country_code = excluded.country_code,
            probe_results = excluded.probe_results,
            private_hit_count = excluded.private_hit_count,
            success_rate_percent = excluded.success_rate_percent,
            scan_duration_seconds = excluded.scan_duration_seconds,
            created_at = excluded.created_at
        ",
    )
    .bind(record.identifier.as_str())
    .bind(&record.country_code)
    .bind(probe_results)
    .bind(i64::from(record.private_hit_count))
    .bind(record.success_rate_percent)
    .bind(record.scan_duration_seconds)
    .bind(format_timestamp(&record.created_at))
    .execute(pool)
    .await?;

    tracing::debug!("Upserted scan record for {}", record.identifier);
    Ok(())
}

/// Get the scan record stored for an identifier.
///
/// Returns `Ok(None)` when the identifier was never scanned.
///
/// # Errors
/// Returns `DatabaseError` if the query or row decoding fails.
pub async fn get_by_identifier(pool: &SqlitePool, identifier: &str) -> Result<Option<ScanRecord>> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE identifier = ?"))
        .bind(identifier)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// List the most recently created scan records, newest first.
///
/// # Errors
/// Returns `DatabaseError` if the query or row decoding fails.
pub async fn list_recent(pool: &SqlitePool, limit: u32) -> Result<Vec<ScanRecord>> {
    let rows = sqlx::query(&format!(
        "{SELECT_COLUMNS} ORDER BY created_at DESC, identifier ASC LIMIT ?"
    ))
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

/// Compute summary statistics over every stored record.
///
/// # Errors
/// Returns `DatabaseError` if the aggregate query fails.
pub async fn aggregate_stats(pool: &SqlitePool) -> Result<ScanStats> {
    let (total_scans, total_private_hits, avg_success_rate, unique_identifiers) =
        sqlx::query_as::<_, (i64, i64, f64, i64)>(
            r"
            SELECT
                COUNT(*),
                COALESCE(SUM(private_hit_count), 0),
                COALESCE(AVG(success_rate_percent), 0.0),
                COUNT(DISTINCT identifier)
            FROM scan_records
            ",
        )
        .fetch_one(pool)
        .await?;

    Ok(ScanStats {
        total_scans: to_count(total_scans),
        total_private_hits: to_count(total_private_hits),
        avg_success_rate,
        unique_identifiers: to_count(unique_identifiers),
    })
}

/// Delete the record for an identifier.
///
/// Returns whether a record was removed.
///
/// # Errors
/// Returns `DatabaseError` if the delete fails.
pub async fn delete(pool: &SqlitePool, identifier: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM scan_records WHERE identifier = ?")
        .bind(identifier)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn record_from_row(row: &SqliteRow) -> Result<ScanRecord> {
    let identifier: String = row.try_get("identifier")?;
    let probe_results: String = row.try_get("probe_results")?;
    let probe_results: Vec<ProbeResult> = serde_json::from_str(&probe_results).map_err(|e| {
        DatabaseError::Decode(format!(
            "invalid probe_results for '{identifier}' in scan_records table: {e}"
        ))
    })?;
    let private_hit_count: i64 = row.try_get("private_hit_count")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(ScanRecord {
        country_code: row.try_get("country_code")?,
        probe_results,
        private_hit_count: u32::try_from(private_hit_count).map_err(|_| {
            DatabaseError::Decode(format!(
                "private_hit_count out of range for '{identifier}': {private_hit_count}"
            ))
        })?,
        success_rate_percent: row.try_get("success_rate_percent")?,
        scan_duration_seconds: row.try_get("scan_duration_seconds")?,
        created_at: parse_timestamp(&created_at)?,
        identifier: Identifier::from_normalized(identifier),
    })
}

/// Fixed-width UTC format so lexical order in `SQLite` matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid created_at '{s}': {e}")))
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}
