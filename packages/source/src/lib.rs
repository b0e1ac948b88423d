#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the National Grid ESO auction results datastore.
//!
//! The remote side is a CKAN `datastore_search_sql` endpoint queried
//! with SQL-style filters over HTTP GET. This package owns everything
//! between the wire and the typed [`AuctionRecord`]: the retry policy,
//! the count probe, the page fetcher, and the pure record mapper.
//!
//! [`AuctionRecord`]: auction_watch_models::AuctionRecord

pub mod api;
pub mod normalize;
pub mod retry;
pub mod sql;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::retry::RetryError;

pub use crate::api::AuctionApi;

/// Errors from remote datastore operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response parsed as JSON but did not have the expected
    /// `result.records` envelope shape.
    #[error("Unexpected response envelope: {message}")]
    Envelope {
        /// Description of what was missing or malformed.
        message: String,
    },

    /// The retry budget ran out; carries the final attempt's failure.
    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The failure from the final attempt.
        #[source]
        source: Box<SourceError>,
    },
}

impl SourceError {
    /// Returns `true` if the error is likely transient and worth
    /// retrying: connection failures, timeouts, truncated bodies,
    /// HTTP 429, and HTTP 5xx. Client errors and malformed envelopes
    /// are permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.is_body()
                    || e.is_decode()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
            }
            Self::Envelope { .. } | Self::RetriesExhausted { .. } => false,
        }
    }
}

impl From<RetryError<SourceError>> for SourceError {
    fn from(err: RetryError<SourceError>) -> Self {
        match err {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { attempts, source } => Self::RetriesExhausted {
                attempts,
                source: Box::new(source),
            },
        }
    }
}

/// The seam between the ingestion loop and the remote API.
///
/// The loop only ever asks two questions: how many records match the
/// scope, and what is the page at a given offset. Implementations must
/// answer both from the same filter predicate.
#[async_trait]
pub trait AuctionFeed: Send + Sync {
    /// How many records match the scope right now.
    async fn total_count(&self) -> Result<u64, SourceError>;

    /// One page of raw records, skipping `offset` rows and taking up to
    /// `limit`.
    async fn fetch_page(&self, limit: u64, offset: u64) -> Result<Vec<Value>, SourceError>;
}
