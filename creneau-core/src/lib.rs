pub mod booking;
pub mod events;
pub mod hold;
pub mod notify;
pub mod payment;
pub mod period;
pub mod repository;
pub mod slot;

pub use booking::{Booking, BookingStatus, ContactDetails};
pub use events::SlotChanged;
pub use hold::Hold;
pub use period::YearMonth;
pub use repository::{BookingRepository, HoldRepository, ReservationStore, SlotRepository};
pub use slot::{Slot, SlotStatus};

/// Outcome taxonomy for every reservation-path operation.
///
/// `Conflict` and `Expired` are definitive: the caller must pick another
/// slot or restart from a fresh hold. Only `Transient` is retryable.
#[derive(Debug, thiserror::Error)]
pub enum ReserveError {
    #[error("slot taken by another party: {0}")]
    Conflict(uuid::Uuid),
    #[error("expired: {0}")]
    Expired(uuid::Uuid),
    #[error("store unavailable: {0}")]
    Transient(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReserveError {
    /// Only transient store failures may be retried; conflicts and
    /// expiries must never be re-attempted against the same target.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReserveError::Transient(_))
    }
}

pub type ReserveResult<T> = Result<T, ReserveError>;
