use creneau_core::SlotChanged;
use tokio::sync::broadcast;
use tracing::trace;

/// In-process fan-out for slot transitions. Writers publish after every
/// successful transition; the availability cache subscribes to
/// invalidate affected months. Sends to a bus with no live subscriber
/// are dropped, not errors.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SlotChanged>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: SlotChanged) {
        trace!(slot_id = %event.slot_id, status = ?event.status, "slot changed");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SlotChanged> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use creneau_core::SlotStatus;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        let slot_id = Uuid::new_v4();
        bus.publish(SlotChanged {
            slot_id,
            provider_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            status: SlotStatus::Held,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.slot_id, slot_id);
    }

    #[test]
    fn test_publish_without_subscriber_is_silent() {
        let bus = EventBus::new(8);
        bus.publish(SlotChanged {
            slot_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            status: SlotStatus::Open,
        });
    }
}
