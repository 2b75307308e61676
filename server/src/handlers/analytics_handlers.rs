use axum::{extract::State, Json};

use crate::middleware::metrics::AnalyticsReport;
use crate::state::AppState;

pub async fn analytics(State(state): State<AppState>) -> Json<AnalyticsReport> {
    Json(state.metrics.report())
}
