//! Reporting route handlers.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::db::reports::{self, SummaryReport};
use crate::error::Result;
use crate::state::AppState;

/// Store-wide summary: order counts by status and recognized revenue.
#[instrument(skip(state))]
pub async fn summary(State(state): State<AppState>) -> Result<Json<SummaryReport>> {
    Ok(Json(reports::summary(state.pool()).await?))
}
