use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time-boxed, client-scoped claim on a slot.
///
/// A hold past `expires_at` is void even before the sweep collects it;
/// every reader must treat it as such.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub holder_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    pub fn new(slot_id: Uuid, holder_token: String, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slot_id,
            holder_token,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_expiry() {
        let now = Utc::now();
        let hold = Hold::new(Uuid::new_v4(), "tok-1".to_string(), Duration::minutes(5), now);

        assert!(!hold.is_expired(now));
        assert!(!hold.is_expired(now + Duration::minutes(4)));
        assert!(hold.is_expired(now + Duration::minutes(5)));
        assert!(hold.is_expired(now + Duration::minutes(6)));
    }
}
