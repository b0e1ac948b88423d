//! SQL text for the CKAN `datastore_search_sql` endpoint.
//!
//! The count probe and the page fetcher must run the exact same filter
//! predicate — if they drift, pagination silently gaps or overlaps. Both
//! statements are therefore built from one [`scope_predicate`].

use auction_watch_models::QueryScope;

/// The shared `FROM ... WHERE ...` clause scoping every query to one
/// participant and a half-open one-day delivery window.
fn scope_predicate(resource_id: &str, scope: &QueryScope) -> String {
    let participant = escape_literal(&scope.participant);
    format!(
        "FROM \"{resource_id}\" \
         WHERE \"registeredAuctionParticipant\" = '{participant}' \
         AND \"deliveryStart\" >= '{}' \
         AND \"deliveryStart\" < '{}'",
        scope.day,
        scope.next_day(),
    )
}

/// Statement asking how many records match the scope.
#[must_use]
pub fn count_sql(resource_id: &str, scope: &QueryScope) -> String {
    format!(
        "SELECT count(*) AS \"count\" {}",
        scope_predicate(resource_id, scope)
    )
}

/// Statement fetching one page of matching records.
#[must_use]
pub fn page_sql(resource_id: &str, scope: &QueryScope, limit: u64, offset: u64) -> String {
    format!(
        "SELECT * {} LIMIT {limit} OFFSET {offset}",
        scope_predicate(resource_id, scope)
    )
}

/// Doubles single quotes so a participant name cannot break out of its
/// string literal.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn scope() -> QueryScope {
        QueryScope::new(
            "HABITAT ENERGY LIMITED",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        )
    }

    #[test]
    fn count_and_page_share_one_predicate() {
        let predicate = scope_predicate("res-1", &scope());
        assert!(count_sql("res-1", &scope()).contains(&predicate));
        assert!(page_sql("res-1", &scope(), 500, 1000).contains(&predicate));
    }

    #[test]
    fn predicate_uses_half_open_day_window() {
        let sql = count_sql("res-1", &scope());
        assert!(sql.contains("\"deliveryStart\" >= '2024-05-01'"));
        assert!(sql.contains("\"deliveryStart\" < '2024-05-02'"));
        assert!(sql.contains("\"registeredAuctionParticipant\" = 'HABITAT ENERGY LIMITED'"));
    }

    #[test]
    fn page_sql_appends_limit_and_offset() {
        let sql = page_sql("res-1", &scope(), 500, 1500);
        assert!(sql.ends_with("LIMIT 500 OFFSET 1500"));
        assert!(sql.starts_with("SELECT * FROM \"res-1\""));
    }

    #[test]
    fn participant_quotes_are_escaped() {
        let scope = QueryScope::new(
            "O'BRIEN ENERGY",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        );
        let sql = count_sql("res-1", &scope);
        assert!(sql.contains("'O''BRIEN ENERGY'"));
    }
}
