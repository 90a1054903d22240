use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SlotStatus;

/// Published by the store after every successful slot transition.
/// Consumed by the availability cache to invalidate the affected month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotChanged {
    pub slot_id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub status: SlotStatus,
}
