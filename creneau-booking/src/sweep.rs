use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use creneau_core::{
    HoldRepository, ReservationStore, ReserveError, ReserveResult, SlotRepository, SlotStatus,
};

/// Reclaims expired holds so an abandoned browser tab can never lock a
/// slot for longer than TTL + sweep interval. Holds are data with an
/// expiry timestamp, not per-hold timers, so the sweep is idempotent
/// and survives restarts.
pub struct HoldSweeper {
    store: Arc<dyn ReservationStore>,
    interval: Duration,
}

impl HoldSweeper {
    pub fn new(store: Arc<dyn ReservationStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            match self.sweep_once(now).await {
                Ok(released) if released > 0 => {
                    info!("expiry sweep released {released} slot(s)");
                }
                Ok(_) => {}
                Err(e) => error!("expiry sweep failed: {e}"),
            }
            // archival pass: slots whose date has fully passed
            match self.store.purge_before(now.date_naive()).await {
                Ok(purged) if purged > 0 => info!("archived {purged} past slot(s)"),
                Ok(_) => {}
                Err(e) => error!("archival purge failed: {e}"),
            }
        }
    }

    /// One pass over expired holds. Returns how many slots went back to
    /// open. Races with reclaim/confirm are settled by the version
    /// check; a lost race is left for the next pass.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> ReserveResult<u64> {
        let mut released = 0;
        for hold in self.store.expired_holds(now).await? {
            // the hold may have been reclaimed since the scan
            let Some(current) = self.store.get_hold(hold.id).await? else {
                continue;
            };
            let Some(slot) = self.store.get_slot(current.slot_id).await? else {
                self.store.delete_hold(current.id).await?;
                continue;
            };
            if slot.status == SlotStatus::Held {
                match self
                    .store
                    .try_transition(slot.id, SlotStatus::Held, SlotStatus::Open, slot.version)
                    .await
                {
                    Ok(_) => {
                        self.store.delete_hold(current.id).await?;
                        released += 1;
                    }
                    Err(ReserveError::Conflict(_)) => continue,
                    Err(e) => return Err(e),
                }
            } else {
                // orphan hold on a slot that moved on without it
                self.store.delete_hold(current.id).await?;
            }
        }
        Ok(released)
    }
}
