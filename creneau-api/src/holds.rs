use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use creneau_core::{ContactDetails, SlotRepository};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlaceHoldRequest {
    pub slot_id: Uuid,
    pub holder_token: String,
}

#[derive(Debug, Serialize)]
struct PlaceHoldResponse {
    hold_id: Uuid,
    slot_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmHoldRequest {
    pub client_name: String,
    pub client_phone: String,
    pub client_email: String,
    pub service_description: Option<String>,
    pub address: Option<String>,
    pub deposit_cents: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ConfirmHoldResponse {
    booking_id: Uuid,
    slot_id: Uuid,
    payment_url: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/holds", post(place_hold))
        .route("/v1/holds/{hold_id}/confirm", post(confirm_hold))
        .route("/v1/holds/{hold_id}", delete(release_hold))
}

/// POST /v1/holds: compete for a slot. Exactly one caller wins; the
/// rest get 409. Idempotent per holder token, so a client may retry
/// after a timeout.
async fn place_hold(
    State(state): State<AppState>,
    Json(req): Json<PlaceHoldRequest>,
) -> Result<(StatusCode, Json<PlaceHoldResponse>), AppError> {
    let hold = state
        .coordinator
        .place_hold(req.slot_id, &req.holder_token)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PlaceHoldResponse {
            hold_id: hold.id,
            slot_id: hold.slot_id,
            expires_at: hold.expires_at,
        }),
    ))
}

/// POST /v1/holds/{hold_id}/confirm: turn a live hold into a booking.
/// 410 when the hold expired (restart from a fresh hold), 409 when the
/// slot was lost to a race.
async fn confirm_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
    Json(req): Json<ConfirmHoldRequest>,
) -> Result<(StatusCode, Json<ConfirmHoldResponse>), AppError> {
    let details = ContactDetails {
        client_name: req.client_name,
        client_phone: req.client_phone,
        client_email: req.client_email,
        service_description: req.service_description,
        address: req.address,
    };

    // 1. Confirm; the booking exists once this returns.
    let booking = state
        .coordinator
        .confirm_hold(hold_id, &details, req.deposit_cents)
        .await?;

    // 2. Deposit redirect, only after success. Payment failure never
    //    reverts the booking.
    let payment_url = match booking.deposit_cents {
        Some(amount_cents) => match state.payment.create_redirect(booking.id, amount_cents).await {
            Ok(redirect) => Some(redirect.url),
            Err(e) => {
                warn!("payment redirect for booking {} failed: {}", booking.id, e);
                None
            }
        },
        None => None,
    };

    // 3. Fire-and-forget confirmation dispatch.
    if let Some(slot) = state.store.get_slot(booking.slot_id).await? {
        let notifier = state.notifier.clone();
        let notified = booking.clone();
        tokio::spawn(async move {
            notifier.booking_confirmed(&notified, &slot).await;
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(ConfirmHoldResponse {
            booking_id: booking.id,
            slot_id: booking.slot_id,
            payment_url,
        }),
    ))
}

/// DELETE /v1/holds/{hold_id}: explicit cancel, always 204.
/// Best-effort: the expiry sweep is the safety net.
async fn release_hold(
    State(state): State<AppState>,
    Path(hold_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.coordinator.release_hold(hold_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
