use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use creneau_core::{
    HoldRepository, ReservationStore, ReserveResult, Slot, SlotChanged, SlotRepository, SlotStatus,
    YearMonth,
};

/// One calendar entry as shown to a client. Reads are advisory: a slot
/// shown as available may still lose the hold race.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlotView {
    pub slot_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
    /// The caller's own live hold ("your selection").
    pub yours: bool,
}

struct CachedMonth {
    slots: Vec<Slot>,
    fetched_at: Instant,
}

/// Cheap month-level reads for the calendar UI, off the store's write
/// path. Entries expire after `max_age` and are dropped eagerly when a
/// slot transition event arrives for the month.
pub struct AvailabilityReader {
    store: Arc<dyn ReservationStore>,
    cache: RwLock<HashMap<(Uuid, YearMonth), CachedMonth>>,
    max_age: Duration,
}

impl AvailabilityReader {
    pub fn new(store: Arc<dyn ReservationStore>, max_age: Duration) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    async fn month_slots(&self, provider_id: Uuid, month: YearMonth) -> ReserveResult<Vec<Slot>> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&(provider_id, month)) {
                if entry.fetched_at.elapsed() < self.max_age {
                    return Ok(entry.slots.clone());
                }
            }
        }

        let slots = self.store.read_month(provider_id, month).await?;
        let mut cache = self.cache.write().await;
        cache.insert(
            (provider_id, month),
            CachedMonth {
                slots: slots.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(slots)
    }

    /// Month calendar for one client: open slots, plus the caller's own
    /// live hold. Held slots whose hold has expired (or vanished) are
    /// void and read as open; everything else is omitted.
    pub async fn month_view(
        &self,
        provider_id: Uuid,
        month: YearMonth,
        holder_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReserveResult<BTreeMap<NaiveDate, Vec<SlotView>>> {
        let slots = self.month_slots(provider_id, month).await?;
        let mut view: BTreeMap<NaiveDate, Vec<SlotView>> = BTreeMap::new();

        for slot in slots {
            if slot.starts_at() <= now {
                continue;
            }
            let entry = match slot.status {
                SlotStatus::Open => Some(SlotView {
                    slot_id: slot.id,
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                    available: true,
                    yours: false,
                }),
                SlotStatus::Held => match self.store.hold_for_slot(slot.id).await? {
                    Some(hold) if !hold.is_expired(now) => {
                        if holder_token == Some(hold.holder_token.as_str()) {
                            Some(SlotView {
                                slot_id: slot.id,
                                start_time: slot.start_time,
                                end_time: slot.end_time,
                                available: false,
                                yours: true,
                            })
                        } else {
                            None
                        }
                    }
                    // a void hold does not make the slot unavailable
                    _ => Some(SlotView {
                        slot_id: slot.id,
                        start_time: slot.start_time,
                        end_time: slot.end_time,
                        available: true,
                        yours: false,
                    }),
                },
                SlotStatus::Confirmed | SlotStatus::Blocked => None,
            };
            if let Some(entry) = entry {
                view.entry(slot.date).or_default().push(entry);
            }
        }
        Ok(view)
    }

    /// Bookable slots for the scorer: open, or held with a void hold.
    pub async fn open_slots(
        &self,
        provider_id: Uuid,
        month: YearMonth,
        now: DateTime<Utc>,
    ) -> ReserveResult<Vec<Slot>> {
        let slots = self.month_slots(provider_id, month).await?;
        let mut open = Vec::new();
        for slot in slots {
            if slot.starts_at() <= now {
                continue;
            }
            match slot.status {
                SlotStatus::Open => open.push(slot),
                SlotStatus::Held => {
                    let void = match self.store.hold_for_slot(slot.id).await? {
                        Some(hold) => hold.is_expired(now),
                        None => true,
                    };
                    if void {
                        open.push(slot);
                    }
                }
                SlotStatus::Confirmed | SlotStatus::Blocked => {}
            }
        }
        Ok(open)
    }

    pub async fn invalidate(&self, provider_id: Uuid, date: NaiveDate) {
        let month = YearMonth::from_date(date);
        let mut cache = self.cache.write().await;
        if cache.remove(&(provider_id, month)).is_some() {
            debug!("availability cache invalidated: {} {}", provider_id, month);
        }
    }
}

/// Background task: drop cached months as slot transitions land.
pub async fn watch(reader: Arc<AvailabilityReader>, mut rx: broadcast::Receiver<SlotChanged>) {
    loop {
        match rx.recv().await {
            Ok(event) => reader.invalidate(event.provider_id, event.date).await,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                // lost events mean unknown months are stale; drop everything
                warn!("availability watcher lagged by {missed} events, clearing cache");
                reader.cache.write().await.clear();
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use creneau_core::{Hold, HoldRepository, SlotRepository};
    use creneau_store::{EventBus, MemoryStore};

    fn future_slot(provider_id: Uuid, days_ahead: u64, hour: u32) -> Slot {
        let date = Utc::now().date_naive() + chrono::Days::new(days_ahead);
        Slot::new(
            provider_id,
            None,
            date,
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_open_and_own_held_slots_are_visible() {
        let store = Arc::new(MemoryStore::default());
        let reader = AvailabilityReader::new(store.clone(), Duration::from_secs(5));
        let provider = Uuid::new_v4();
        let now = Utc::now();

        let open = future_slot(provider, 7, 9);
        store.insert_slot(&open).await.unwrap();

        let mine = future_slot(provider, 7, 10);
        store.insert_slot(&mine).await.unwrap();
        store
            .try_transition(mine.id, SlotStatus::Open, SlotStatus::Held, 0)
            .await
            .unwrap();
        store
            .insert_hold(&Hold::new(
                mine.id,
                "tok-mine".to_string(),
                ChronoDuration::minutes(5),
                now,
            ))
            .await
            .unwrap();

        let theirs = future_slot(provider, 7, 11);
        store.insert_slot(&theirs).await.unwrap();
        store
            .try_transition(theirs.id, SlotStatus::Open, SlotStatus::Held, 0)
            .await
            .unwrap();
        store
            .insert_hold(&Hold::new(
                theirs.id,
                "tok-other".to_string(),
                ChronoDuration::minutes(5),
                now,
            ))
            .await
            .unwrap();

        let month = YearMonth::from_date(open.date);
        let view = reader
            .month_view(provider, month, Some("tok-mine"), now)
            .await
            .unwrap();
        let day = view.get(&open.date).unwrap();

        assert_eq!(day.len(), 2);
        assert!(day.iter().any(|v| v.slot_id == open.id && v.available && !v.yours));
        assert!(day.iter().any(|v| v.slot_id == mine.id && !v.available && v.yours));
        assert!(!day.iter().any(|v| v.slot_id == theirs.id));
    }

    #[tokio::test]
    async fn test_void_hold_reads_as_open() {
        let store = Arc::new(MemoryStore::default());
        let reader = AvailabilityReader::new(store.clone(), Duration::from_secs(5));
        let provider = Uuid::new_v4();
        let now = Utc::now();

        let slot = future_slot(provider, 5, 14);
        store.insert_slot(&slot).await.unwrap();
        store
            .try_transition(slot.id, SlotStatus::Open, SlotStatus::Held, 0)
            .await
            .unwrap();
        store
            .insert_hold(&Hold::new(
                slot.id,
                "tok-gone".to_string(),
                ChronoDuration::zero(),
                now - ChronoDuration::minutes(10),
            ))
            .await
            .unwrap();

        let month = YearMonth::from_date(slot.date);
        let view = reader.month_view(provider, month, None, now).await.unwrap();
        let day = view.get(&slot.date).unwrap();
        assert_eq!(day.len(), 1);
        assert!(day[0].available);

        let open = reader.open_slots(provider, month, now).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, slot.id);
    }

    #[tokio::test]
    async fn test_cache_hit_and_invalidation() {
        let bus = EventBus::new(16);
        let store = Arc::new(MemoryStore::new(bus.clone()));
        let reader = AvailabilityReader::new(store.clone(), Duration::from_secs(60));
        let provider = Uuid::new_v4();
        let now = Utc::now();

        let slot = future_slot(provider, 4, 9);
        store.insert_slot(&slot).await.unwrap();
        let month = YearMonth::from_date(slot.date);

        let view = reader.month_view(provider, month, None, now).await.unwrap();
        assert_eq!(view.len(), 1);

        // a second slot is invisible until the cache entry is dropped
        let late = future_slot(provider, 4, 16);
        store.insert_slot(&late).await.unwrap();
        let view = reader.month_view(provider, month, None, now).await.unwrap();
        assert_eq!(view.values().map(|v| v.len()).sum::<usize>(), 1);

        reader.invalidate(provider, slot.date).await;
        let view = reader.month_view(provider, month, None, now).await.unwrap();
        assert_eq!(view.values().map(|v| v.len()).sum::<usize>(), 2);
    }
}
