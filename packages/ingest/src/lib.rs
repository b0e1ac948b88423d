#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The ingestion engine: probe the remote count once, then page through
//! the matching records — fetch, map, write, pause — until the cursor
//! reaches the probed total.
//!
//! Control flow is strictly sequential. Every network and storage call
//! blocks the loop, and the pause between pages is deliberate headroom
//! over the remote's documented rate limit, not something to optimize
//! away.

use std::time::Duration;

use async_trait::async_trait;
use auction_watch_database::{DbError, insert_auction_records};
use auction_watch_models::AuctionRecord;
use auction_watch_source::normalize::{MappingError, map_record};
use auction_watch_source::{AuctionFeed, SourceError};
use chrono::NaiveDate;
use switchy_database::Database;

/// Blocking pause between page fetches. The remote documents a limit of
/// one request per second; 2 seconds leaves headroom.
pub const RATE_LIMIT_DELAY: Duration = Duration::from_secs(2);

/// Records requested per page unless overridden at construction.
pub const DEFAULT_PAGE_SIZE: u64 = 500;

/// A terminal ingestion failure. Any of these aborts the run; there is
/// no partial recovery and no automatic resume.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The remote API failed (after retries, for transient failures).
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A raw record could not be mapped; never retried, and the rest of
    /// its page is lost.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// The local store failed; never retried.
    #[error(transparent)]
    Database(#[from] DbError),
}

/// The seam between the ingestion loop and the local store.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Writes a batch atomically and returns the committed count.
    async fn write_batch(&self, records: &[AuctionRecord]) -> Result<u64, DbError>;
}

/// [`RecordSink`] backed by the `SQLite` store.
pub struct SqliteSink<'a> {
    db: &'a dyn Database,
}

impl<'a> SqliteSink<'a> {
    /// Wraps an open database handle.
    #[must_use]
    pub const fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordSink for SqliteSink<'_> {
    async fn write_batch(&self, records: &[AuctionRecord]) -> Result<u64, DbError> {
        insert_auction_records(self.db, records).await
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    /// The remote count observed at loop start.
    pub total_available: u64,
    /// Rows committed to the store by this run.
    pub ingested: u64,
    /// Pages written.
    pub pages: u64,
}

/// One ingestion run: a fixed scope, a fixed ingestion date, and the
/// loop that drains the remote record set through the feed into the
/// sink.
pub struct Ingestor<'a> {
    feed: &'a dyn AuctionFeed,
    sink: &'a dyn RecordSink,
    page_size: u64,
    page_delay: Duration,
    ingested_on: String,
}

impl<'a> Ingestor<'a> {
    /// Creates an engine with the default page size and rate-limit
    /// delay. `ingested_on` stamps every record this run writes, even if
    /// the run itself crosses midnight.
    #[must_use]
    pub fn new(feed: &'a dyn AuctionFeed, sink: &'a dyn RecordSink, ingested_on: NaiveDate) -> Self {
        Self {
            feed,
            sink,
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: RATE_LIMIT_DELAY,
            ingested_on: ingested_on.format("%Y-%m-%d").to_string(),
        }
    }

    /// Overrides the page size (minimum 1).
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = if page_size == 0 { 1 } else { page_size };
        self
    }

    /// Overrides the pause between pages. Production keeps
    /// [`RATE_LIMIT_DELAY`]; tests pass zero.
    #[must_use]
    pub const fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Runs the loop to completion.
    ///
    /// The cursor (`report.ingested`) advances only after a page's
    /// transaction commits, and doubles as the next fetch offset, so
    /// pages partition `[0, total)` with no gap or overlap. An empty
    /// page before the total is reached means the remote shrank
    /// mid-run; the loop treats it as exhaustion rather than spinning.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] on the first unresolved fetch, mapping,
    /// or write failure. Already-committed pages stay committed.
    pub async fn run(&self) -> Result<IngestReport, IngestError> {
        let total = self.feed.total_count().await?;
        log::info!("{total} auction results in scope");

        let mut report = IngestReport {
            total_available: total,
            ..IngestReport::default()
        };

        while report.ingested < total {
            let raw = self.feed.fetch_page(self.page_size, report.ingested).await?;

            if raw.is_empty() {
                log::warn!(
                    "empty page at offset {} with only {}/{total} ingested; treating the remote as exhausted",
                    report.ingested,
                    report.ingested,
                );
                break;
            }

            let mut records = Vec::with_capacity(raw.len());
            for value in &raw {
                records.push(map_record(value, &self.ingested_on)?);
            }

            let committed = self.sink.write_batch(&records).await?;
            report.ingested += committed;
            report.pages += 1;

            log::info!(
                "page {}: committed {committed} records ({}/{total})",
                report.pages,
                report.ingested,
            );

            if report.ingested < total {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn raw_record(id: i64) -> Value {
        json!({
            "_id": id,
            "auctionUnit": format!("UNIT-{id}"),
            "serviceType": "Response",
            "auctionProduct": "DCL",
            "executedQuantity": "12.9",
            "clearingPrice": "8.25",
            "deliveryStart": "2024-05-01T23:00:00",
            "deliveryEnd": "2024-05-02T23:00:00",
            "technologyType": "Battery",
            "postCode": "EX1",
            "unitResultID": format!("UR-{id}"),
            "_full_text": "'battery':3",
        })
    }

    struct ScriptedFeed {
        total: u64,
        pages: Vec<Vec<Value>>,
        offsets: Mutex<Vec<u64>>,
    }

    impl ScriptedFeed {
        fn new(total: u64, pages: Vec<Vec<Value>>) -> Self {
            Self {
                total,
                pages,
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<u64> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuctionFeed for ScriptedFeed {
        async fn total_count(&self) -> Result<u64, SourceError> {
            Ok(self.total)
        }

        async fn fetch_page(&self, _limit: u64, offset: u64) -> Result<Vec<Value>, SourceError> {
            let mut offsets = self.offsets.lock().unwrap();
            offsets.push(offset);
            Ok(self.pages.get(offsets.len() - 1).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct MemorySink {
        written: Mutex<Vec<AuctionRecord>>,
    }

    impl MemorySink {
        fn rows(&self) -> Vec<AuctionRecord> {
            self.written.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn write_batch(&self, records: &[AuctionRecord]) -> Result<u64, DbError> {
            self.written.lock().unwrap().extend_from_slice(records);
            Ok(records.len() as u64)
        }
    }

    struct FailingSink;

    #[async_trait]
    impl RecordSink for FailingSink {
        async fn write_batch(&self, _records: &[AuctionRecord]) -> Result<u64, DbError> {
            Err(DbError::Database("disk I/O error".to_string()))
        }
    }

    fn ingestor<'a>(feed: &'a ScriptedFeed, sink: &'a dyn RecordSink) -> Ingestor<'a> {
        Ingestor::new(feed, sink, day())
            .with_page_size(5)
            .with_page_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn pages_partition_the_record_set() {
        let feed = ScriptedFeed::new(
            7,
            vec![
                (0..5).map(raw_record).collect(),
                (5..7).map(raw_record).collect(),
            ],
        );
        let sink = MemorySink::default();

        let report = ingestor(&feed, &sink).run().await.unwrap();

        assert_eq!(report.total_available, 7);
        assert_eq!(report.ingested, 7);
        assert_eq!(report.pages, 2);
        assert_eq!(feed.offsets(), vec![0, 5]);

        let rows = sink.rows();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].source_id, 0);
        assert_eq!(rows[6].source_id, 6);
        // Truncated, not rounded, and stamped with the run date.
        assert_eq!(rows[0].executed_quantity, 12);
        assert_eq!(rows[0].ingested_on, "2024-05-01");
    }

    #[tokio::test]
    async fn zero_total_fetches_nothing() {
        let feed = ScriptedFeed::new(0, vec![]);
        let sink = MemorySink::default();

        let report = ingestor(&feed, &sink).run().await.unwrap();

        assert_eq!(report.ingested, 0);
        assert_eq!(report.pages, 0);
        assert!(feed.offsets().is_empty());
    }

    #[tokio::test]
    async fn empty_page_before_total_means_exhausted() {
        let feed = ScriptedFeed::new(7, vec![(0..5).map(raw_record).collect(), Vec::new()]);
        let sink = MemorySink::default();

        let report = ingestor(&feed, &sink).run().await.unwrap();

        assert_eq!(report.ingested, 5);
        assert_eq!(report.pages, 1);
        assert_eq!(feed.offsets(), vec![0, 5]);
    }

    #[tokio::test]
    async fn rerunning_a_window_appends_duplicates() {
        let pages: Vec<Vec<Value>> = vec![(0..3).map(raw_record).collect()];
        let sink = MemorySink::default();

        let feed = ScriptedFeed::new(3, pages.clone());
        ingestor(&feed, &sink).run().await.unwrap();
        let feed = ScriptedFeed::new(3, pages);
        ingestor(&feed, &sink).run().await.unwrap();

        let rows = sink.rows();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].source_id, rows[3].source_id);
    }

    #[tokio::test]
    async fn mapping_failure_aborts_before_any_write() {
        let mut bad = raw_record(1);
        bad.as_object_mut().unwrap().remove("executedQuantity");
        let feed = ScriptedFeed::new(2, vec![vec![raw_record(0), bad]]);
        let sink = MemorySink::default();

        let result = ingestor(&feed, &sink).run().await;

        assert!(matches!(result, Err(IngestError::Mapping(_))));
        assert!(sink.rows().is_empty());
    }

    #[tokio::test]
    async fn write_failure_aborts_the_run() {
        let feed = ScriptedFeed::new(7, vec![(0..5).map(raw_record).collect()]);

        let result = ingestor(&feed, &FailingSink).run().await;

        assert!(matches!(result, Err(IngestError::Database(_))));
        // The failed page is not refetched.
        assert_eq!(feed.offsets(), vec![0]);
    }
}
