use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use creneau_core::{ReserveError, Slot, SlotRepository, SlotStatus};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PublishSlotsRequest {
    pub provider_id: Uuid,
    pub slots: Vec<PublishSlot>,
}

#[derive(Debug, Deserialize)]
pub struct PublishSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub resource_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct PublishSlotsResponse {
    slot_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    pub before: NaiveDate,
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
    purged: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/slots", post(publish_slots))
        .route("/v1/admin/slots/{slot_id}/block", post(block_slot))
        .route("/v1/admin/slots/purge", post(purge_slots))
}

/// POST /v1/admin/slots: a provider publishes calendar windows.
async fn publish_slots(
    State(state): State<AppState>,
    Json(req): Json<PublishSlotsRequest>,
) -> Result<(StatusCode, Json<PublishSlotsResponse>), AppError> {
    let mut slot_ids = Vec::with_capacity(req.slots.len());
    for window in &req.slots {
        if window.start_time >= window.end_time {
            return Err(ReserveError::Validation(format!(
                "slot on {} ends before it starts",
                window.date
            ))
            .into());
        }
        let slot = Slot::new(
            req.provider_id,
            window.resource_id,
            window.date,
            window.start_time,
            window.end_time,
        );
        state.store.insert_slot(&slot).await?;
        slot_ids.push(slot.id);
    }
    Ok((StatusCode::CREATED, Json(PublishSlotsResponse { slot_ids })))
}

/// POST /v1/admin/slots/{slot_id}/block: provider retires a window;
/// allowed from any status. A lost race is a 409, retry as the caller.
async fn block_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Slot>, AppError> {
    let slot = state
        .store
        .get_slot(slot_id)
        .await?
        .ok_or_else(|| ReserveError::NotFound(format!("slot {slot_id}")))?;
    if slot.status == SlotStatus::Blocked {
        return Ok(Json(slot));
    }
    let blocked = state
        .store
        .try_transition(slot_id, slot.status, SlotStatus::Blocked, slot.version)
        .await?;
    Ok(Json(blocked))
}

/// POST /v1/admin/slots/purge: archival removal of fully past days.
async fn purge_slots(
    State(state): State<AppState>,
    Json(req): Json<PurgeRequest>,
) -> Result<Json<PurgeResponse>, AppError> {
    let purged = state.store.purge_before(req.before).await?;
    Ok(Json(PurgeResponse { purged }))
}
