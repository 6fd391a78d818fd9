//! Per-source aggregates.

use axum::{extract::State, Json};
use hookbin_core::SourceCount;
use serde::Serialize;
use tracing::instrument;

use crate::{ApiError, AppState};

/// Response of `GET /api/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Number of stored events
    pub total_events: u64,
    /// Counts per source, largest first
    pub by_source: Vec<SourceCount>,
}

/// Counts stored events by source.
#[instrument(name = "stats", skip_all)]
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.store.count_by_source().await?;
    Ok(Json(StatsResponse { total_events: stats.total, by_source: stats.by_source }))
}
