use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slot status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Open,
    Held,
    Confirmed,
    Blocked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Open => "OPEN",
            SlotStatus::Held => "HELD",
            SlotStatus::Confirmed => "CONFIRMED",
            SlotStatus::Blocked => "BLOCKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(SlotStatus::Open),
            "HELD" => Some(SlotStatus::Held),
            "CONFIRMED" => Some(SlotStatus::Confirmed),
            "BLOCKED" => Some(SlotStatus::Blocked),
            _ => None,
        }
    }
}

/// A bookable time interval published by a provider.
///
/// `version` is the optimistic-lock token: every successful transition
/// bumps it, and every transition must name the version it observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub resource_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: SlotStatus,
    pub version: i64,
}

impl Slot {
    pub fn new(
        provider_id: Uuid,
        resource_id: Option<Uuid>,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id,
            resource_id,
            date,
            start_time,
            end_time,
            status: SlotStatus::Open,
            version: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == SlotStatus::Open
    }

    /// Start of the interval as an instant (calendar times are UTC).
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.start_time).and_utc()
    }
}
