#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record types shared across the auction ingestion pipeline.
//!
//! The remote API serves raw key/value records; the source package maps
//! them into [`AuctionRecord`], which is what the database package
//! persists. Records are immutable once written — reruns append, they
//! never update.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// The auction participant the original deployment tracks.
pub const DEFAULT_PARTICIPANT: &str = "HABITAT ENERGY LIMITED";

/// A single auction result, mapped from one raw API record.
///
/// All string fields are opaque copies of what the API returned — the
/// delivery timestamps in particular are stored verbatim, not parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionRecord {
    /// Primary key of the record on the remote side. Not unique locally;
    /// a rerun for the same window inserts the same IDs again.
    pub source_id: i64,
    /// Auction unit identifier.
    pub auction_unit: String,
    /// Grid service type (e.g. response/reserve product family).
    pub service_type: String,
    /// Auctioned product name.
    pub auction_product: String,
    /// Executed quantity in MW, truncated from the API's decimal string.
    pub executed_quantity: i64,
    /// Clearing price in GBP/MW/h.
    pub clearing_price: f64,
    /// Delivery window start, verbatim from the API.
    pub delivery_start: String,
    /// Delivery window end, verbatim from the API.
    pub delivery_end: String,
    /// Technology type of the providing unit.
    pub technology_type: String,
    /// Post code of the providing unit.
    pub post_code: String,
    /// Unit result identifier.
    pub unit_result_id: String,
    /// Denormalized full-text search blob from the datastore.
    pub full_text: String,
    /// UTC date (`YYYY-MM-DD`) of the run that wrote this row. Fixed at
    /// engine construction, so every row of one run carries the same
    /// stamp even if the run spans midnight.
    pub ingested_on: String,
}

/// The filter every remote query is scoped by: one participant, one
/// delivery day.
///
/// Both the count probe and the page fetcher build their predicates from
/// the same `QueryScope` value — constructing them from separate values
/// risks silent pagination gaps or overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryScope {
    /// Registered auction participant, matched by equality.
    pub participant: String,
    /// UTC delivery day; records are in scope when their delivery start
    /// falls inside `[day, day + 1)`.
    pub day: NaiveDate,
}

impl QueryScope {
    /// Creates a scope for the given participant and delivery day.
    #[must_use]
    pub fn new(participant: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            participant: participant.into(),
            day,
        }
    }

    /// The exclusive upper bound of the delivery window.
    #[must_use]
    pub fn next_day(&self) -> NaiveDate {
        // NaiveDate::MAX is centuries away from any real delivery day.
        self.day.checked_add_days(Days::new(1)).unwrap_or(self.day)
    }
}
