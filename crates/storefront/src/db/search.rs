//! Search term log and the popular-terms aggregate.

use serde::Serialize;
use sqlx::PgPool;

use bramble_core::RepositoryError;

use super::backend_err;

/// A search term with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PopularTerm {
    pub term: String,
    pub count: i64,
}

/// Record a search term. Best-effort: callers log failures and carry on,
/// since losing one data point must not fail the search itself.
///
/// # Errors
///
/// Returns `RepositoryError` if the insert fails.
pub async fn record_search(pool: &PgPool, term: &str) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO search_queries (term) VALUES ($1)")
        .bind(term.trim().to_lowercase())
        .execute(pool)
        .await
        .map_err(backend_err)?;
    Ok(())
}

/// The most-searched terms, most frequent first.
///
/// This is the expensive aggregate the popular-query cache fronts; it
/// scans the full log. Callers go through the cache, not here.
///
/// # Errors
///
/// Returns `RepositoryError` if the query fails.
pub async fn popular_terms(pool: &PgPool, limit: i64) -> Result<Vec<PopularTerm>, RepositoryError> {
    sqlx::query_as(
        "SELECT term, COUNT(*) AS count FROM search_queries \
         GROUP BY term ORDER BY count DESC, term LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(backend_err)
}
