use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use creneau_core::{
    Booking, BookingRepository, ContactDetails, Hold, HoldRepository, ReservationStore,
    ReserveError, ReserveResult, SlotRepository, SlotStatus,
};
use creneau_store::app_config::BookingRules;

const MAX_TOKEN_LEN: usize = 128;

/// Turns client intent into safe slot store transitions; the only
/// writer of hold and booking records.
///
/// Public operations run under a bounded timeout and retry transient
/// store failures with exponential backoff. Whole-operation retry is
/// safe because `place_hold` is idempotent per holder token and the
/// confirm unit fails closed. Conflict and expiry are returned
/// immediately, never retried.
pub struct ReservationCoordinator {
    store: Arc<dyn ReservationStore>,
    rules: BookingRules,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn ReservationStore>, rules: BookingRules) -> Self {
        Self { store, rules }
    }

    pub async fn place_hold(&self, slot_id: Uuid, holder_token: &str) -> ReserveResult<Hold> {
        self.bounded(self.with_retry(|| self.place_hold_at(slot_id, holder_token, Utc::now())))
            .await
    }

    pub async fn confirm_hold(
        &self,
        hold_id: Uuid,
        details: &ContactDetails,
        deposit_cents: Option<i64>,
    ) -> ReserveResult<Booking> {
        self.bounded(
            self.with_retry(|| self.confirm_hold_at(hold_id, details, deposit_cents, Utc::now())),
        )
        .await
    }

    /// Single hold attempt against a pinned clock.
    pub async fn place_hold_at(
        &self,
        slot_id: Uuid,
        holder_token: &str,
        now: DateTime<Utc>,
    ) -> ReserveResult<Hold> {
        validate_token(holder_token)?;

        // 1. Idempotency: a retry after a lost response must not create
        //    a second hold.
        if let Some(existing) = self.store.find_hold_by_token(slot_id, holder_token).await? {
            if !existing.is_expired(now) {
                return Ok(existing);
            }
        }

        // 2. Observe the slot; a held slot whose hold is void gets
        //    reclaimed before we compete for it.
        let slot = self
            .store
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| ReserveError::NotFound(format!("slot {slot_id}")))?;
        if slot.starts_at() <= now {
            return Err(ReserveError::Expired(slot_id));
        }

        let open_slot = match slot.status {
            SlotStatus::Open => slot,
            SlotStatus::Held => {
                match self.store.hold_for_slot(slot_id).await? {
                    Some(hold) if !hold.is_expired(now) => {
                        return Err(ReserveError::Conflict(slot_id))
                    }
                    stale => {
                        // expired hold, or a held slot with no hold record
                        let reopened = self
                            .store
                            .try_transition(slot_id, SlotStatus::Held, SlotStatus::Open, slot.version)
                            .await?;
                        if let Some(hold) = stale {
                            self.store.delete_hold(hold.id).await?;
                        }
                        reopened
                    }
                }
            }
            SlotStatus::Confirmed | SlotStatus::Blocked => {
                return Err(ReserveError::Conflict(slot_id))
            }
        };

        // 3. Compete: exactly one caller wins this version.
        self.store
            .try_transition(slot_id, SlotStatus::Open, SlotStatus::Held, open_slot.version)
            .await?;

        let hold = Hold::new(slot_id, holder_token.to_string(), self.rules.hold_ttl(), now);
        self.store.insert_hold(&hold).await?;
        Ok(hold)
    }

    /// Single confirm attempt against a pinned clock.
    ///
    /// An expired hold fails closed: no slot store mutation happens
    /// here, the sweep owns the revert.
    pub async fn confirm_hold_at(
        &self,
        hold_id: Uuid,
        details: &ContactDetails,
        deposit_cents: Option<i64>,
        now: DateTime<Utc>,
    ) -> ReserveResult<Booking> {
        // 1. Validate before touching the store.
        details.validate()?;

        // 2. The hold must still exist and be live. A swept hold is gone,
        //    which reads the same as expired.
        let hold = match self.store.get_hold(hold_id).await? {
            Some(hold) => hold,
            None => return Err(ReserveError::Expired(hold_id)),
        };
        if hold.is_expired(now) {
            return Err(ReserveError::Expired(hold_id));
        }

        // 3. Transition + booking creation, one atomic unit.
        let slot = self
            .store
            .get_slot(hold.slot_id)
            .await?
            .ok_or_else(|| ReserveError::Internal(format!("hold references missing slot {}", hold.slot_id)))?;
        if slot.status != SlotStatus::Held {
            return Err(ReserveError::Conflict(slot.id));
        }

        let booking = Booking::new(hold.slot_id, details.clone(), deposit_cents, now);
        self.store
            .confirm_hold(hold.slot_id, slot.version, &booking)
            .await?;
        Ok(booking)
    }

    /// Explicit client cancel. Best-effort: the TTL sweep is the
    /// correctness net, this only shortens the visible-taken window.
    pub async fn release_hold(&self, hold_id: Uuid) -> ReserveResult<()> {
        self.bounded(async {
            let hold = match self.store.get_hold(hold_id).await? {
                Some(hold) => hold,
                None => return Ok(()),
            };
            if let Some(slot) = self.store.get_slot(hold.slot_id).await? {
                if slot.status == SlotStatus::Held {
                    if let Err(e) = self
                        .store
                        .try_transition(slot.id, SlotStatus::Held, SlotStatus::Open, slot.version)
                        .await
                    {
                        debug!("release of hold {} lost a race: {}", hold_id, e);
                    }
                }
            }
            self.store.delete_hold(hold_id).await
        })
        .await
    }

    async fn bounded<T>(&self, fut: impl Future<Output = ReserveResult<T>>) -> ReserveResult<T> {
        match tokio::time::timeout(self.rules.op_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(ReserveError::Transient("operation timed out".into())),
        }
    }

    async fn with_retry<T, F, Fut>(&self, op: F) -> ReserveResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ReserveResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < self.rules.transient_retry_attempts => {
                    attempt += 1;
                    let delay = self.rules.transient_retry_base_ms << attempt.min(6);
                    debug!("transient store failure (attempt {attempt}), retrying in {delay}ms: {e}");
                    sleep(std::time::Duration::from_millis(delay)).await;
                }
                result => return result,
            }
        }
    }
}

fn validate_token(holder_token: &str) -> ReserveResult<()> {
    if holder_token.trim().is_empty() {
        return Err(ReserveError::Validation("holder_token is required".into()));
    }
    if holder_token.len() > MAX_TOKEN_LEN {
        return Err(ReserveError::Validation("holder_token too long".into()));
    }
    Ok(())
}
