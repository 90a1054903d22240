use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use creneau_core::YearMonth;
use creneau_recommend::{recommend, Recommendation};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub month: String,
    pub limit: Option<usize>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/v1/providers/{provider_id}/recommendations",
        get(get_recommendations),
    )
}

/// GET /v1/providers/{provider_id}/recommendations?month=YYYY-MM&limit=N
///
/// Pure function of the current availability snapshot and the
/// configured demand signals; identical inputs rank identically.
async fn get_recommendations(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<RecommendationsQuery>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let month: YearMonth = query.month.parse()?;
    let now = Utc::now();

    let open = state.reader.open_slots(provider_id, month, now).await?;
    let limit = query.limit.unwrap_or(state.max_recommendations);
    let ranked = recommend(&open, &state.signals, now, limit);
    Ok(Json(ranked))
}
