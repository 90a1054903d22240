use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use creneau_core::{Booking, BookingRepository, ReserveError};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    /// Retire the slot instead of reopening it.
    #[serde(default)]
    pub retire_slot: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{booking_id}", get(get_booking))
        .route("/v1/bookings/{booking_id}/cancel", post(cancel_booking))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .store
        .get_booking(booking_id)
        .await?
        .ok_or_else(|| ReserveError::NotFound(format!("booking {booking_id}")))?;
    Ok(Json(booking))
}

/// POST /v1/bookings/{booking_id}/cancel: atomically reverts the slot
/// to open (or blocked) and marks the booking cancelled. The record is
/// kept for audit; cancelling twice is a no-op.
async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let cancelled = state
        .store
        .cancel_booking(booking_id, req.retire_slot)
        .await?;
    Ok(Json(cancelled))
}
