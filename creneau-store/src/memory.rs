use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use creneau_core::{
    Booking, BookingRepository, BookingStatus, Hold, HoldRepository, ReserveError, ReserveResult,
    Slot, SlotChanged, SlotRepository, SlotStatus, YearMonth,
};

use crate::events::EventBus;

type WindowKey = (Uuid, Option<Uuid>, NaiveDate, NaiveTime);

#[derive(Default)]
struct Inner {
    slots: HashMap<Uuid, Slot>,
    windows: HashMap<WindowKey, Uuid>,
    holds: HashMap<Uuid, Hold>,
    holds_by_slot: HashMap<Uuid, Uuid>,
    bookings: HashMap<Uuid, Booking>,
    live_booking_by_slot: HashMap<Uuid, Uuid>,
}

/// Default store backend. A single write-lock critical section per
/// operation gives the compare-and-swap contract its per-slot
/// serialization; the durable equivalent lives in `pg.rs`.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    events: EventBus,
}

impl MemoryStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    fn emit(&self, slot: &Slot) {
        self.events.publish(SlotChanged {
            slot_id: slot.id,
            provider_id: slot.provider_id,
            date: slot.date,
            status: slot.status,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}

#[async_trait]
impl SlotRepository for MemoryStore {
    async fn insert_slot(&self, slot: &Slot) -> ReserveResult<()> {
        let mut inner = self.inner.write().await;
        if inner.slots.contains_key(&slot.id) {
            return Err(ReserveError::Validation(format!(
                "slot {} already exists",
                slot.id
            )));
        }
        let key = (slot.provider_id, slot.resource_id, slot.date, slot.start_time);
        if inner.windows.contains_key(&key) {
            return Err(ReserveError::Validation(
                "slot overlaps an existing published slot".into(),
            ));
        }
        inner.windows.insert(key, slot.id);
        inner.slots.insert(slot.id, slot.clone());
        Ok(())
    }

    async fn get_slot(&self, slot_id: Uuid) -> ReserveResult<Option<Slot>> {
        Ok(self.inner.read().await.slots.get(&slot_id).cloned())
    }

    async fn read_month(&self, provider_id: Uuid, month: YearMonth) -> ReserveResult<Vec<Slot>> {
        let inner = self.inner.read().await;
        let mut slots: Vec<Slot> = inner
            .slots
            .values()
            .filter(|s| s.provider_id == provider_id && month.contains(s.date))
            .cloned()
            .collect();
        slots.sort_by(|a, b| (a.date, a.start_time, a.id).cmp(&(b.date, b.start_time, b.id)));
        Ok(slots)
    }

    async fn try_transition(
        &self,
        slot_id: Uuid,
        from: SlotStatus,
        to: SlotStatus,
        expected_version: i64,
    ) -> ReserveResult<Slot> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .slots
            .get_mut(&slot_id)
            .ok_or_else(|| ReserveError::NotFound(format!("slot {slot_id}")))?;
        if slot.status != from || slot.version != expected_version {
            return Err(ReserveError::Conflict(slot_id));
        }
        slot.status = to;
        slot.version += 1;
        let updated = slot.clone();
        drop(inner);
        self.emit(&updated);
        Ok(updated)
    }

    async fn purge_before(&self, cutoff: NaiveDate) -> ReserveResult<u64> {
        if cutoff > Utc::now().date_naive() {
            return Err(ReserveError::Validation(
                "purge cutoff must not be in the future".into(),
            ));
        }
        let mut inner = self.inner.write().await;
        let doomed: Vec<Uuid> = inner
            .slots
            .values()
            .filter(|s| s.date < cutoff)
            .map(|s| s.id)
            .collect();
        for slot_id in &doomed {
            if let Some(slot) = inner.slots.remove(slot_id) {
                inner
                    .windows
                    .remove(&(slot.provider_id, slot.resource_id, slot.date, slot.start_time));
            }
            if let Some(hold_id) = inner.holds_by_slot.remove(slot_id) {
                inner.holds.remove(&hold_id);
            }
            // bookings stay, for audit
            inner.live_booking_by_slot.remove(slot_id);
        }
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl HoldRepository for MemoryStore {
    async fn insert_hold(&self, hold: &Hold) -> ReserveResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(old_id) = inner.holds_by_slot.insert(hold.slot_id, hold.id) {
            if old_id != hold.id {
                inner.holds.remove(&old_id);
            }
        }
        inner.holds.insert(hold.id, hold.clone());
        Ok(())
    }

    async fn get_hold(&self, hold_id: Uuid) -> ReserveResult<Option<Hold>> {
        Ok(self.inner.read().await.holds.get(&hold_id).cloned())
    }

    async fn hold_for_slot(&self, slot_id: Uuid) -> ReserveResult<Option<Hold>> {
        let inner = self.inner.read().await;
        Ok(inner
            .holds_by_slot
            .get(&slot_id)
            .and_then(|id| inner.holds.get(id))
            .cloned())
    }

    async fn find_hold_by_token(
        &self,
        slot_id: Uuid,
        holder_token: &str,
    ) -> ReserveResult<Option<Hold>> {
        let inner = self.inner.read().await;
        Ok(inner
            .holds_by_slot
            .get(&slot_id)
            .and_then(|id| inner.holds.get(id))
            .filter(|h| h.holder_token == holder_token)
            .cloned())
    }

    async fn delete_hold(&self, hold_id: Uuid) -> ReserveResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(hold) = inner.holds.remove(&hold_id) {
            if inner.holds_by_slot.get(&hold.slot_id) == Some(&hold_id) {
                inner.holds_by_slot.remove(&hold.slot_id);
            }
        }
        Ok(())
    }

    async fn expired_holds(&self, now: DateTime<Utc>) -> ReserveResult<Vec<Hold>> {
        let inner = self.inner.read().await;
        Ok(inner
            .holds
            .values()
            .filter(|h| h.is_expired(now))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn confirm_hold(
        &self,
        slot_id: Uuid,
        expected_version: i64,
        booking: &Booking,
    ) -> ReserveResult<Slot> {
        if booking.slot_id != slot_id {
            return Err(ReserveError::Validation(
                "booking does not reference the confirmed slot".into(),
            ));
        }
        let mut inner = self.inner.write().await;
        let slot = inner
            .slots
            .get_mut(&slot_id)
            .ok_or_else(|| ReserveError::NotFound(format!("slot {slot_id}")))?;
        if slot.status != SlotStatus::Held || slot.version != expected_version {
            return Err(ReserveError::Conflict(slot_id));
        }
        if inner.live_booking_by_slot.contains_key(&slot_id) {
            return Err(ReserveError::Conflict(slot_id));
        }

        let slot = inner.slots.get_mut(&slot_id).expect("checked above");
        slot.status = SlotStatus::Confirmed;
        slot.version += 1;
        let updated = slot.clone();

        inner.bookings.insert(booking.id, booking.clone());
        inner.live_booking_by_slot.insert(slot_id, booking.id);
        if let Some(hold_id) = inner.holds_by_slot.remove(&slot_id) {
            inner.holds.remove(&hold_id);
        }
        drop(inner);
        self.emit(&updated);
        Ok(updated)
    }

    async fn get_booking(&self, booking_id: Uuid) -> ReserveResult<Option<Booking>> {
        Ok(self.inner.read().await.bookings.get(&booking_id).cloned())
    }

    async fn booking_for_slot(&self, slot_id: Uuid) -> ReserveResult<Option<Booking>> {
        let inner = self.inner.read().await;
        Ok(inner
            .live_booking_by_slot
            .get(&slot_id)
            .and_then(|id| inner.bookings.get(id))
            .cloned())
    }

    async fn cancel_booking(&self, booking_id: Uuid, retire_slot: bool) -> ReserveResult<Booking> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let slot_id = {
            let booking = inner
                .bookings
                .get(&booking_id)
                .ok_or_else(|| ReserveError::NotFound(format!("booking {booking_id}")))?;
            if booking.status == BookingStatus::Cancelled {
                return Ok(booking.clone());
            }
            booking.slot_id
        };

        let slot = inner.slots.get_mut(&slot_id).ok_or_else(|| {
            ReserveError::Internal(format!("booking references missing slot {slot_id}"))
        })?;
        slot.status = if retire_slot {
            SlotStatus::Blocked
        } else {
            SlotStatus::Open
        };
        slot.version += 1;
        let updated = slot.clone();

        let booking = inner.bookings.get_mut(&booking_id).expect("checked above");
        booking.cancel(now);
        let cancelled = booking.clone();
        inner.live_booking_by_slot.remove(&slot_id);
        drop(inner);
        self.emit(&updated);
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creneau_core::ContactDetails;

    fn slot(provider_id: Uuid, day: u32, hour: u32) -> Slot {
        Slot::new(
            provider_id,
            None,
            NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
        )
    }

    fn details() -> ContactDetails {
        ContactDetails {
            client_name: "Paul Martin".to_string(),
            client_phone: "+33699887766".to_string(),
            client_email: "paul@example.com".to_string(),
            service_description: None,
            address: None,
        }
    }

    #[tokio::test]
    async fn test_cas_version_and_status_guards() {
        let store = MemoryStore::default();
        let s = slot(Uuid::new_v4(), 10, 14);
        store.insert_slot(&s).await.unwrap();

        let held = store
            .try_transition(s.id, SlotStatus::Open, SlotStatus::Held, 0)
            .await
            .unwrap();
        assert_eq!(held.status, SlotStatus::Held);
        assert_eq!(held.version, 1);

        // stale version
        let err = store
            .try_transition(s.id, SlotStatus::Open, SlotStatus::Held, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ReserveError::Conflict(id) if id == s.id));

        // status mismatch at the current version
        let err = store
            .try_transition(s.id, SlotStatus::Open, SlotStatus::Confirmed, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ReserveError::Conflict(_)));

        // unknown slot
        let err = store
            .try_transition(Uuid::new_v4(), SlotStatus::Open, SlotStatus::Held, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ReserveError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cas_single_winner() {
        let store = std::sync::Arc::new(MemoryStore::default());
        let s = slot(Uuid::new_v4(), 10, 14);
        store.insert_slot(&s).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let slot_id = s.id;
            handles.push(tokio::spawn(async move {
                store
                    .try_transition(slot_id, SlotStatus::Open, SlotStatus::Held, 0)
                    .await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(ReserveError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 15);
    }

    #[tokio::test]
    async fn test_confirm_is_atomic_and_unique_per_slot() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let s = slot(Uuid::new_v4(), 12, 9);
        store.insert_slot(&s).await.unwrap();

        let held = store
            .try_transition(s.id, SlotStatus::Open, SlotStatus::Held, 0)
            .await
            .unwrap();
        let hold = Hold::new(s.id, "tok-a".to_string(), chrono::Duration::minutes(5), now);
        store.insert_hold(&hold).await.unwrap();

        let booking = Booking::new(s.id, details(), None, now);
        let confirmed = store
            .confirm_hold(s.id, held.version, &booking)
            .await
            .unwrap();
        assert_eq!(confirmed.status, SlotStatus::Confirmed);

        // the hold is consumed in the same unit
        assert!(store.hold_for_slot(s.id).await.unwrap().is_none());
        assert_eq!(
            store.booking_for_slot(s.id).await.unwrap().unwrap().id,
            booking.id
        );

        // a second confirm loses on status/version
        let other = Booking::new(s.id, details(), None, now);
        let err = store
            .confirm_hold(s.id, confirmed.version, &other)
            .await
            .unwrap_err();
        assert!(matches!(err, ReserveError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_cancel_reverts_slot_and_keeps_record() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let s = slot(Uuid::new_v4(), 15, 10);
        store.insert_slot(&s).await.unwrap();
        let held = store
            .try_transition(s.id, SlotStatus::Open, SlotStatus::Held, 0)
            .await
            .unwrap();
        let booking = Booking::new(s.id, details(), Some(2000), now);
        store.confirm_hold(s.id, held.version, &booking).await.unwrap();

        let cancelled = store.cancel_booking(booking.id, false).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let slot_after = store.get_slot(s.id).await.unwrap().unwrap();
        assert_eq!(slot_after.status, SlotStatus::Open);

        // audit record survives, and the slot can be booked again
        assert!(store.get_booking(booking.id).await.unwrap().is_some());
        assert!(store.booking_for_slot(s.id).await.unwrap().is_none());

        // idempotent second cancel
        let again = store.cancel_booking(booking.id, false).await.unwrap();
        assert_eq!(again.status, BookingStatus::Cancelled);
        assert_eq!(
            store.get_slot(s.id).await.unwrap().unwrap().status,
            SlotStatus::Open
        );
    }

    #[tokio::test]
    async fn test_cancel_can_retire_slot() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let s = slot(Uuid::new_v4(), 16, 11);
        store.insert_slot(&s).await.unwrap();
        let held = store
            .try_transition(s.id, SlotStatus::Open, SlotStatus::Held, 0)
            .await
            .unwrap();
        let booking = Booking::new(s.id, details(), None, now);
        store.confirm_hold(s.id, held.version, &booking).await.unwrap();

        store.cancel_booking(booking.id, true).await.unwrap();
        assert_eq!(
            store.get_slot(s.id).await.unwrap().unwrap().status,
            SlotStatus::Blocked
        );
    }

    #[tokio::test]
    async fn test_duplicate_window_rejected() {
        let store = MemoryStore::default();
        let provider = Uuid::new_v4();
        let s = slot(provider, 20, 9);
        store.insert_slot(&s).await.unwrap();

        let mut dup = slot(provider, 20, 9);
        dup.end_time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let err = store.insert_slot(&dup).await.unwrap_err();
        assert!(matches!(err, ReserveError::Validation(_)));
    }

    #[tokio::test]
    async fn test_purge_guard_and_archival() {
        let store = MemoryStore::default();
        let provider = Uuid::new_v4();
        let today = Utc::now().date_naive();

        let mut past = slot(provider, 10, 9);
        past.date = today - chrono::Days::new(3);
        store.insert_slot(&past).await.unwrap();
        let mut future = slot(provider, 10, 10);
        future.date = today + chrono::Days::new(3);
        store.insert_slot(&future).await.unwrap();

        // cutoff in the future is refused
        let err = store
            .purge_before(today + chrono::Days::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ReserveError::Validation(_)));

        let purged = store.purge_before(today).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get_slot(past.id).await.unwrap().is_none());
        assert!(store.get_slot(future.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_hold_lookup_and_expiry_scan() {
        let store = MemoryStore::default();
        let now = Utc::now();
        let s = slot(Uuid::new_v4(), 22, 14);
        store.insert_slot(&s).await.unwrap();

        let hold = Hold::new(s.id, "tok-z".to_string(), chrono::Duration::minutes(5), now);
        store.insert_hold(&hold).await.unwrap();

        assert_eq!(
            store
                .find_hold_by_token(s.id, "tok-z")
                .await
                .unwrap()
                .unwrap()
                .id,
            hold.id
        );
        assert!(store.find_hold_by_token(s.id, "other").await.unwrap().is_none());

        assert!(store.expired_holds(now).await.unwrap().is_empty());
        let later = now + chrono::Duration::minutes(6);
        let expired = store.expired_holds(later).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, hold.id);

        store.delete_hold(hold.id).await.unwrap();
        assert!(store.hold_for_slot(s.id).await.unwrap().is_none());
    }
}
