use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use creneau_core::{Booking, ContactDetails, Hold, ReserveError};

use crate::coordinator::ReservationCoordinator;
use crate::overlay::SlotOverlay;

/// Client-visible booking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Browsing,
    Held,
    DetailsCollected,
    Confirming,
    Confirmed,
    Failed,
    Abandoned,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid transition from {from:?} on {action}")]
    InvalidTransition {
        from: WorkflowState,
        action: &'static str,
    },

    #[error(transparent)]
    Reserve(#[from] ReserveError),
}

/// One client session driving the reservation coordinator:
/// browse → hold → collect details → confirm, with rollback of the
/// optimistic overlay on every failure path. `Confirmed` is only ever
/// reached on an explicit success return from the coordinator.
pub struct BookingWorkflow {
    coordinator: Arc<ReservationCoordinator>,
    holder_token: String,
    state: WorkflowState,
    overlay: SlotOverlay,
    hold: Option<Hold>,
    details: Option<ContactDetails>,
    booking: Option<Booking>,
}

impl BookingWorkflow {
    pub fn new(coordinator: Arc<ReservationCoordinator>, holder_token: String) -> Self {
        Self {
            coordinator,
            holder_token,
            state: WorkflowState::Browsing,
            overlay: SlotOverlay::new(),
            hold: None,
            details: None,
            booking: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn overlay(&self) -> &SlotOverlay {
        &self.overlay
    }

    pub fn booking(&self) -> Option<&Booking> {
        self.booking.as_ref()
    }

    /// Select a slot from the calendar. The slot is marked reserved
    /// locally before the hold request resolves; on any failure the
    /// mark is rolled back and the session stays in Browsing.
    pub async fn select_slot(&mut self, slot_id: Uuid) -> Result<Hold, WorkflowError> {
        self.expect(WorkflowState::Browsing, "select_slot")?;

        self.overlay.mark_optimistic(slot_id);
        match self
            .coordinator
            .place_hold(slot_id, &self.holder_token)
            .await
        {
            Ok(hold) => {
                self.state = WorkflowState::Held;
                self.hold = Some(hold.clone());
                Ok(hold)
            }
            Err(e) => {
                debug!("hold on {slot_id} failed, rolling back optimistic mark: {e}");
                self.overlay.roll_back(slot_id);
                Err(e.into())
            }
        }
    }

    /// Contact form submitted.
    pub fn collect_details(&mut self, details: ContactDetails) -> Result<(), WorkflowError> {
        self.expect(WorkflowState::Held, "collect_details")?;
        details.validate()?;
        self.details = Some(details);
        self.state = WorkflowState::DetailsCollected;
        Ok(())
    }

    /// Confirm the held slot. Expired or lost holds send the session
    /// back to Browsing (the hold is gone, a slot must be re-selected);
    /// a transient failure after retries is terminal for this session.
    pub async fn confirm(&mut self, deposit_cents: Option<i64>) -> Result<Booking, WorkflowError> {
        self.expect(WorkflowState::DetailsCollected, "confirm")?;
        let hold = self.hold.clone().ok_or(WorkflowError::InvalidTransition {
            from: self.state,
            action: "confirm",
        })?;
        let details = self.details.clone().ok_or(WorkflowError::InvalidTransition {
            from: self.state,
            action: "confirm",
        })?;

        self.state = WorkflowState::Confirming;
        match self
            .coordinator
            .confirm_hold(hold.id, &details, deposit_cents)
            .await
        {
            Ok(booking) => {
                self.overlay.confirm(hold.slot_id);
                self.state = WorkflowState::Confirmed;
                self.booking = Some(booking.clone());
                Ok(booking)
            }
            Err(e @ (ReserveError::Expired(_) | ReserveError::Conflict(_))) => {
                self.overlay.roll_back(hold.slot_id);
                self.hold = None;
                self.state = WorkflowState::Browsing;
                Err(e.into())
            }
            Err(e) => {
                self.overlay.roll_back(hold.slot_id);
                self.state = WorkflowState::Failed;
                Err(e.into())
            }
        }
    }

    /// User navigated away. Release is best-effort; the TTL sweep
    /// covers the case where it never lands.
    pub async fn abandon(&mut self) -> Result<(), WorkflowError> {
        match self.state {
            WorkflowState::Held | WorkflowState::DetailsCollected => {}
            from => {
                return Err(WorkflowError::InvalidTransition {
                    from,
                    action: "abandon",
                })
            }
        }
        if let Some(hold) = self.hold.take() {
            if let Err(e) = self.coordinator.release_hold(hold.id).await {
                debug!("release on abandon failed (sweep will reclaim): {e}");
            }
            self.overlay.roll_back(hold.slot_id);
        }
        self.state = WorkflowState::Abandoned;
        Ok(())
    }

    fn expect(&self, state: WorkflowState, action: &'static str) -> Result<(), WorkflowError> {
        if self.state != state {
            return Err(WorkflowError::InvalidTransition {
                from: self.state,
                action,
            });
        }
        Ok(())
    }
}
