use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use creneau_availability::SlotView;
use creneau_core::YearMonth;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub month: String,
    pub holder_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    provider_id: Uuid,
    month: String,
    days: BTreeMap<NaiveDate, Vec<SlotView>>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/v1/providers/{provider_id}/availability",
        get(get_availability),
    )
}

/// GET /v1/providers/{provider_id}/availability?month=YYYY-MM
///
/// Advisory view: a slot listed here may still lose the hold race.
async fn get_availability(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let month: YearMonth = query.month.parse()?;
    let days = state
        .reader
        .month_view(provider_id, month, query.holder_token.as_deref(), Utc::now())
        .await?;

    Ok(Json(AvailabilityResponse {
        provider_id,
        month: month.to_string(),
        days,
    }))
}
