use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ReserveError, ReserveResult};

/// Booking status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// Client contact fields collected before confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactDetails {
    pub client_name: String,
    pub client_phone: String,
    pub client_email: String,
    pub service_description: Option<String>,
    pub address: Option<String>,
}

impl ContactDetails {
    /// Checked before any store interaction is attempted.
    pub fn validate(&self) -> ReserveResult<()> {
        if self.client_name.trim().is_empty() {
            return Err(ReserveError::Validation("client_name is required".into()));
        }
        if self.client_name.len() > 200 {
            return Err(ReserveError::Validation("client_name too long".into()));
        }
        if self.client_phone.trim().is_empty() {
            return Err(ReserveError::Validation("client_phone is required".into()));
        }
        if !self.client_email.contains('@') {
            return Err(ReserveError::Validation("client_email is invalid".into()));
        }
        if self
            .service_description
            .as_ref()
            .is_some_and(|d| d.len() > 1000)
        {
            return Err(ReserveError::Validation("service_description too long".into()));
        }
        if self.address.as_ref().is_some_and(|a| a.len() > 500) {
            return Err(ReserveError::Validation("address too long".into()));
        }
        Ok(())
    }
}

/// The durable outcome of a confirmed hold. Never deleted; cancellation
/// only flips the status, for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub details: ContactDetails,
    pub deposit_cents: Option<i64>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn new(
        slot_id: Uuid,
        details: ContactDetails,
        deposit_cents: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            slot_id,
            details,
            deposit_cents,
            status: BookingStatus::Confirmed,
            created_at: now,
            cancelled_at: None,
        }
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(now);
    }
}
