use async_trait::async_trait;
use tracing::info;

use crate::booking::Booking;
use crate::slot::Slot;

/// Fire-and-forget confirmation dispatch (email/SMS live behind this
/// seam). Implementations absorb their own failures; booking state is
/// never affected by delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn booking_confirmed(&self, booking: &Booking, slot: &Slot);
}

/// Default sink: records the confirmation in the log stream.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn booking_confirmed(&self, booking: &Booking, slot: &Slot) {
        info!(
            "Booking confirmed: {} for slot {} on {} {}",
            booking.id, slot.id, slot.date, slot.start_time
        );
    }
}
