#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `SQLite` persistence for auction results.
//!
//! Opens (or creates) the local store and appends batches of
//! [`AuctionRecord`] rows. Uses `switchy_database` for all database
//! operations. Rows are immutable: there is no upsert, no dedup, and no
//! uniqueness constraint on the remote `source_id` — rerunning a window
//! inserts the same records again.

use std::path::Path;

use auction_watch_models::AuctionRecord;
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};
use switchy_database_connection::init_sqlite_rusqlite;

/// Default path for the auction results database.
pub const DEFAULT_DB_PATH: &str = "data/auctions.db";

/// Errors from local store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed (e.g., creating the database file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens (or creates) the auction results `SQLite` database at the given
/// path and ensures the schema exists. Safe to call on every start.
///
/// # Errors
///
/// Returns [`DbError`] if the database file cannot be created or the
/// schema DDL fails.
pub async fn open_db(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Database(e.to_string()))?;

    ensure_schema(db.as_ref()).await?;

    Ok(db)
}

/// Creates the auction results table if it doesn't already exist.
///
/// `id` is the store's own key; `source_id` is the remote key and is
/// deliberately not unique.
async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS auction_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL,
            auction_unit TEXT NOT NULL,
            service_type TEXT NOT NULL,
            auction_product TEXT NOT NULL,
            executed_quantity INTEGER NOT NULL,
            clearing_price REAL NOT NULL,
            delivery_start TEXT NOT NULL,
            delivery_end TEXT NOT NULL,
            technology_type TEXT NOT NULL,
            post_code TEXT NOT NULL,
            unit_result_id TEXT NOT NULL,
            full_text TEXT NOT NULL,
            ingested_on TEXT NOT NULL
        )",
    )
    .await
    .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(())
}

const INSERT_SQL: &str = "INSERT INTO auction_results (
        source_id, auction_unit, service_type, auction_product,
        executed_quantity, clearing_price, delivery_start, delivery_end,
        technology_type, post_code, unit_result_id, full_text, ingested_on
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Binds one record to the insert statement's placeholders, in column
/// order.
fn record_params(record: &AuctionRecord) -> Vec<DatabaseValue> {
    vec![
        DatabaseValue::Int64(record.source_id),
        DatabaseValue::String(record.auction_unit.clone()),
        DatabaseValue::String(record.service_type.clone()),
        DatabaseValue::String(record.auction_product.clone()),
        DatabaseValue::Int64(record.executed_quantity),
        DatabaseValue::Real64(record.clearing_price),
        DatabaseValue::String(record.delivery_start.clone()),
        DatabaseValue::String(record.delivery_end.clone()),
        DatabaseValue::String(record.technology_type.clone()),
        DatabaseValue::String(record.post_code.clone()),
        DatabaseValue::String(record.unit_result_id.clone()),
        DatabaseValue::String(record.full_text.clone()),
        DatabaseValue::String(record.ingested_on.clone()),
    ]
}

async fn insert_one(db: &dyn Database, record: &AuctionRecord) -> Result<(), DbError> {
    db.exec_raw_params(INSERT_SQL, &record_params(record))
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(())
}

/// Appends a batch of records in a single transaction and returns the
/// committed count.
///
/// All-or-nothing: on any failure the transaction rolls back and no
/// partial batch lands. Writes are not retried — a transient storage
/// failure aborts the run, and because the caller only advances its
/// cursor on a confirmed commit, the store and the cursor stay
/// consistent.
///
/// # Errors
///
/// Returns [`DbError`] if beginning the transaction, any insert, or the
/// commit fails.
#[allow(clippy::cast_possible_truncation)]
pub async fn insert_auction_records(
    db: &dyn Database,
    records: &[AuctionRecord],
) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }

    let txn = db
        .begin_transaction()
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    for record in records {
        insert_one(txn.as_ref(), record).await?;
    }

    txn.commit()
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    log::debug!("committed {} auction results", records.len());

    Ok(records.len() as u64)
}

/// Executes a `SELECT COUNT(*) AS cnt` query and returns the count.
async fn count_query(db: &dyn Database, sql: &str, params: &[DatabaseValue]) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(sql, params)
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    let n: i64 = rows
        .first()
        .and_then(|r| r.to_value("cnt").ok())
        .unwrap_or(0);

    Ok(n)
}

/// Total number of rows in the store.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn count_auction_records(db: &dyn Database) -> Result<i64, DbError> {
    count_query(db, "SELECT COUNT(*) AS cnt FROM auction_results", &[]).await
}

/// Number of rows written by the run(s) stamped with the given
/// ingestion date (`YYYY-MM-DD`).
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn count_records_for_day(db: &dyn Database, ingested_on: &str) -> Result<i64, DbError> {
    count_query(
        db,
        "SELECT COUNT(*) AS cnt FROM auction_results WHERE ingested_on = ?",
        &[DatabaseValue::String(ingested_on.to_string())],
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AuctionRecord {
        AuctionRecord {
            source_id: 42,
            auction_unit: "HAB-GRID-001".to_string(),
            service_type: "Response".to_string(),
            auction_product: "DCL".to_string(),
            executed_quantity: 12,
            clearing_price: 8.25,
            delivery_start: "2024-05-01T23:00:00".to_string(),
            delivery_end: "2024-05-02T23:00:00".to_string(),
            technology_type: "Battery".to_string(),
            post_code: "EX1".to_string(),
            unit_result_id: "UR-42".to_string(),
            full_text: "'battery':3".to_string(),
            ingested_on: "2024-05-01".to_string(),
        }
    }

    #[test]
    fn insert_binds_every_placeholder() {
        let placeholders = INSERT_SQL.matches('?').count();
        assert_eq!(record_params(&record()).len(), placeholders);
    }

    #[test]
    fn params_start_with_remote_key() {
        let params = record_params(&record());
        assert!(matches!(params[0], DatabaseValue::Int64(42)));
        assert!(matches!(params[4], DatabaseValue::Int64(12)));
        assert!(matches!(params[5], DatabaseValue::Real64(p) if (p - 8.25).abs() < f64::EPSILON));
    }
}
