//! CKAN datastore client: count probe and page fetcher.
//!
//! Both operations run the shared scope predicate from [`crate::sql`]
//! through the retry policy, and both parse the same response envelope:
//! `{"result": {"records": [...]}}`.

use auction_watch_models::QueryScope;
use serde_json::Value;

use crate::retry::RetryPolicy;
use crate::{AuctionFeed, SourceError, sql};

/// The National Grid ESO CKAN SQL search endpoint.
pub const BASE_URL: &str = "https://api.nationalgrideso.com/api/3/action/datastore_search_sql";

/// CKAN resource ID of the auction results dataset.
pub const RESOURCE_ID: &str = "a63ab354-7e68-44c2-ad96-c6f920c30e85";

/// HTTP client for the auction results datastore, scoped to one
/// participant and one delivery day for its whole lifetime.
pub struct AuctionApi {
    client: reqwest::Client,
    base_url: String,
    resource_id: String,
    scope: QueryScope,
    retry: RetryPolicy,
}

impl AuctionApi {
    /// Creates a client against the production endpoint with the default
    /// retry policy.
    #[must_use]
    pub fn new(scope: QueryScope) -> Self {
        Self::with_endpoint(BASE_URL, RESOURCE_ID, scope)
    }

    /// Creates a client against an arbitrary endpoint and resource.
    #[must_use]
    pub fn with_endpoint(base_url: &str, resource_id: &str, scope: QueryScope) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            resource_id: resource_id.to_string(),
            scope,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The scope this client queries with.
    #[must_use]
    pub const fn scope(&self) -> &QueryScope {
        &self.scope
    }

    /// Runs one SQL statement against the datastore, retrying transient
    /// failures per the policy, and returns the parsed JSON body.
    async fn query(&self, statement: String) -> Result<Value, SourceError> {
        let client = self.client.clone();
        let url = self.base_url.clone();

        let result = self
            .retry
            .run_if(
                move || {
                    let client = client.clone();
                    let url = url.clone();
                    let statement = statement.clone();
                    async move {
                        let response = client
                            .get(&url)
                            .query(&[("sql", statement.as_str())])
                            .send()
                            .await?
                            .error_for_status()?;
                        Ok::<_, SourceError>(response.json::<Value>().await?)
                    }
                },
                SourceError::is_transient,
            )
            .await;

        result.map_err(SourceError::from)
    }

    /// How many records match the scope right now.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails after all retries or
    /// the response envelope is malformed.
    pub async fn total_count(&self) -> Result<u64, SourceError> {
        let body = self.query(sql::count_sql(&self.resource_id, &self.scope)).await?;
        parse_count(&body)
    }

    /// Fetches one page of raw records at the given offset.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails after all retries or
    /// the response envelope is malformed.
    pub async fn fetch_page(&self, limit: u64, offset: u64) -> Result<Vec<Value>, SourceError> {
        let body = self
            .query(sql::page_sql(&self.resource_id, &self.scope, limit, offset))
            .await?;
        parse_records(&body)
    }
}

#[async_trait::async_trait]
impl AuctionFeed for AuctionApi {
    async fn total_count(&self) -> Result<u64, SourceError> {
        Self::total_count(self).await
    }

    async fn fetch_page(&self, limit: u64, offset: u64) -> Result<Vec<Value>, SourceError> {
        Self::fetch_page(self, limit, offset).await
    }
}

/// Extracts `result.records` from a datastore response body.
fn records_array(body: &Value) -> Result<&Vec<Value>, SourceError> {
    body.get("result")
        .and_then(|result| result.get("records"))
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Envelope {
            message: "response is missing result.records".to_string(),
        })
}

/// Parses the single-record count envelope into a total.
///
/// CKAN serves the `count(*)` aggregate as either a JSON number or a
/// numeric string depending on the backing store.
pub(crate) fn parse_count(body: &Value) -> Result<u64, SourceError> {
    let records = records_array(body)?;
    let first = records.first().ok_or_else(|| SourceError::Envelope {
        message: "count response had no records".to_string(),
    })?;

    match first.get("count") {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| SourceError::Envelope {
            message: format!("count is not a non-negative integer: {n}"),
        }),
        Some(Value::String(s)) => s.parse().map_err(|_| SourceError::Envelope {
            message: format!("count is not numeric: {s:?}"),
        }),
        _ => Err(SourceError::Envelope {
            message: "count response record had no count field".to_string(),
        }),
    }
}

/// Parses the page envelope into the raw record list.
pub(crate) fn parse_records(body: &Value) -> Result<Vec<Value>, SourceError> {
    Ok(records_array(body)?.clone())
}
