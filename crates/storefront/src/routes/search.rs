//! Search route handlers: product search and the cached popular-terms
//! aggregate. Both sit behind the rate limiter.

use axum::{
    Json,
    extract::{Query, State},
    response::{AppendHeaders, IntoResponse},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::search::{self as search_db, PopularTerm};
use crate::error::{AppError, Result};
use crate::routes::products::ProductView;
use crate::search::CacheKey;
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: i64 = 25;
const DEFAULT_POPULAR_LIMIT: i64 = 10;
const MAX_POPULAR_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<ProductView>,
}

/// Search products by name or description.
///
/// The term is logged for the popular-terms aggregate; a failed log write
/// never fails the search itself.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>> {
    let term = params.q.trim();
    if term.is_empty() {
        return Err(AppError::BadRequest("search term must not be empty".to_string()));
    }
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, 100);

    if let Err(e) = search_db::record_search(state.pool(), term).await {
        tracing::warn!(error = %e, "failed to record search term");
    }

    let products = crate::db::products::search_products(state.pool(), term, limit).await?;
    Ok(Json(SearchResults {
        query: term.to_string(),
        results: products.into_iter().map(ProductView::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PopularParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PopularResults {
    pub terms: Vec<PopularTerm>,
}

/// The most popular search terms, served through the read-through cache.
///
/// The `X-Cache` header marks the response `HIT` or `MISS` for
/// observability.
#[instrument(skip(state))]
pub async fn popular(
    State(state): State<AppState>,
    Query(params): Query<PopularParams>,
) -> Result<impl IntoResponse> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_POPULAR_LIMIT)
        .clamp(1, MAX_POPULAR_LIMIT);

    let pool = state.pool().clone();
    let lookup = state
        .popular_cache()
        .get_or_compute(CacheKey::PopularTerms { limit }, async move {
            search_db::popular_terms(&pool, limit).await
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let cache_status = if lookup.hit { "HIT" } else { "MISS" };
    Ok((
        AppendHeaders([("x-cache", cache_status)]),
        Json(PopularResults {
            terms: lookup.value.as_ref().clone(),
        }),
    ))
}
