use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::booking::Booking;
use crate::hold::Hold;
use crate::period::YearMonth;
use crate::slot::{Slot, SlotStatus};
use crate::ReserveResult;

/// Repository trait for slot records.
///
/// `try_transition` is the only way any slot status changes; it is a
/// single compare-and-swap on `(status, version)` and fails closed.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    async fn insert_slot(&self, slot: &Slot) -> ReserveResult<()>;

    async fn get_slot(&self, slot_id: Uuid) -> ReserveResult<Option<Slot>>;

    /// All slots for the month, every status visible, read-committed.
    async fn read_month(&self, provider_id: Uuid, month: YearMonth) -> ReserveResult<Vec<Slot>>;

    /// Atomic compare-and-swap. Returns the updated slot on success;
    /// `Conflict` when the current status or version does not match,
    /// `NotFound` when the slot does not exist. Never partial state.
    async fn try_transition(
        &self,
        slot_id: Uuid,
        from: SlotStatus,
        to: SlotStatus,
        expected_version: i64,
    ) -> ReserveResult<Slot>;

    /// Archival deletion of slots dated strictly before `cutoff`.
    /// Rejected with `Validation` unless the cutoff has fully passed.
    async fn purge_before(&self, cutoff: NaiveDate) -> ReserveResult<u64>;
}

/// Repository trait for hold records.
#[async_trait]
pub trait HoldRepository: Send + Sync {
    async fn insert_hold(&self, hold: &Hold) -> ReserveResult<()>;

    async fn get_hold(&self, hold_id: Uuid) -> ReserveResult<Option<Hold>>;

    async fn hold_for_slot(&self, slot_id: Uuid) -> ReserveResult<Option<Hold>>;

    /// Idempotency lookup: the hold a given client already has on a slot.
    async fn find_hold_by_token(
        &self,
        slot_id: Uuid,
        holder_token: &str,
    ) -> ReserveResult<Option<Hold>>;

    async fn delete_hold(&self, hold_id: Uuid) -> ReserveResult<()>;

    /// Holds past their expiry, for the sweep.
    async fn expired_holds(&self, now: DateTime<Utc>) -> ReserveResult<Vec<Hold>>;
}

/// Repository trait for booking records.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// The atomic confirm unit: CAS held→confirmed at `expected_version`,
    /// insert the booking, and drop the slot's hold, all or nothing.
    /// A second live booking for the same slot is a `Conflict`.
    async fn confirm_hold(
        &self,
        slot_id: Uuid,
        expected_version: i64,
        booking: &Booking,
    ) -> ReserveResult<Slot>;

    async fn get_booking(&self, booking_id: Uuid) -> ReserveResult<Option<Booking>>;

    async fn booking_for_slot(&self, slot_id: Uuid) -> ReserveResult<Option<Booking>>;

    /// Atomic cancel: booking marked Cancelled, slot reverted to Open
    /// (or Blocked when the provider retires it). Idempotent for an
    /// already-cancelled booking.
    async fn cancel_booking(&self, booking_id: Uuid, retire_slot: bool) -> ReserveResult<Booking>;
}

/// The full store surface the engine is wired with (`Arc<dyn ReservationStore>`).
pub trait ReservationStore: SlotRepository + HoldRepository + BookingRepository {}

impl<T: SlotRepository + HoldRepository + BookingRepository> ReservationStore for T {}
