use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use creneau_core::{
    Booking, BookingRepository, BookingStatus, ContactDetails, Hold, HoldRepository, ReserveError,
    ReserveResult, Slot, SlotChanged, SlotRepository, SlotStatus, YearMonth,
};

use crate::events::EventBus;

/// Durable backend. The compare-and-swap is a single conditional
/// UPDATE, the confirm unit is one transaction; schema in
/// `migrations/0001_init.sql`.
pub struct PgStore {
    pool: PgPool,
    events: EventBus,
}

impl PgStore {
    pub async fn connect(url: &str, events: EventBus) -> ReserveResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .map_err(map_db_err)?;
        Ok(Self { pool, events })
    }

    pub fn with_pool(pool: PgPool, events: EventBus) -> Self {
        Self { pool, events }
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

fn map_db_err(e: sqlx::Error) -> ReserveError {
    ReserveError::Transient(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct SlotRow {
    id: Uuid,
    provider_id: Uuid,
    resource_id: Option<Uuid>,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: String,
    version: i64,
}

impl TryFrom<SlotRow> for Slot {
    type Error = ReserveError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let status = SlotStatus::parse(&row.status)
            .ok_or_else(|| ReserveError::Internal(format!("unknown slot status {:?}", row.status)))?;
        Ok(Slot {
            id: row.id,
            provider_id: row.provider_id,
            resource_id: row.resource_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            version: row.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    slot_id: Uuid,
    holder_token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<HoldRow> for Hold {
    fn from(row: HoldRow) -> Self {
        Hold {
            id: row.id,
            slot_id: row.slot_id,
            holder_token: row.holder_token,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    slot_id: Uuid,
    client_name: String,
    client_phone: String,
    client_email: String,
    service_description: Option<String>,
    address: Option<String>,
    deposit_cents: Option<i64>,
    status: String,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = ReserveError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::parse(&row.status).ok_or_else(|| {
            ReserveError::Internal(format!("unknown booking status {:?}", row.status))
        })?;
        Ok(Booking {
            id: row.id,
            slot_id: row.slot_id,
            details: ContactDetails {
                client_name: row.client_name,
                client_phone: row.client_phone,
                client_email: row.client_email,
                service_description: row.service_description,
                address: row.address,
            },
            deposit_cents: row.deposit_cents,
            status,
            created_at: row.created_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

const SLOT_COLUMNS: &str = "id, provider_id, resource_id, date, start_time, end_time, status, version";
const BOOKING_COLUMNS: &str = "id, slot_id, client_name, client_phone, client_email, service_description, address, deposit_cents, status, created_at, cancelled_at";

#[async_trait]
impl SlotRepository for PgStore {
    async fn insert_slot(&self, slot: &Slot) -> ReserveResult<()> {
        sqlx::query(
            "INSERT INTO slots (id, provider_id, resource_id, date, start_time, end_time, status, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(slot.id)
        .bind(slot.provider_id)
        .bind(slot.resource_id)
        .bind(slot.date)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(slot.status.as_str())
        .bind(slot.version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ReserveError::Validation("slot overlaps an existing published slot".into())
            } else {
                map_db_err(e)
            }
        })?;
        Ok(())
    }

    async fn get_slot(&self, slot_id: Uuid) -> ReserveResult<Option<Slot>> {
        let row = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE id = $1"
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        row.map(Slot::try_from).transpose()
    }

    async fn read_month(&self, provider_id: Uuid, month: YearMonth) -> ReserveResult<Vec<Slot>> {
        let rows = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots \
             WHERE provider_id = $1 AND date >= $2 AND date < $3 \
             ORDER BY date, start_time, id"
        ))
        .bind(provider_id)
        .bind(month.first_day())
        .bind(month.next().first_day())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        rows.into_iter().map(Slot::try_from).collect()
    }

    async fn try_transition(
        &self,
        slot_id: Uuid,
        from: SlotStatus,
        to: SlotStatus,
        expected_version: i64,
    ) -> ReserveResult<Slot> {
        let row = sqlx::query_as::<_, SlotRow>(&format!(
            "UPDATE slots SET status = $1, version = version + 1 \
             WHERE id = $2 AND status = $3 AND version = $4 \
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(to.as_str())
        .bind(slot_id)
        .bind(from.as_str())
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        match row {
            Some(row) => {
                let slot = Slot::try_from(row)?;
                self.emit(&slot);
                Ok(slot)
            }
            // fail closed: distinguish a missing slot from a lost race
            None => match self.get_slot(slot_id).await? {
                Some(_) => Err(ReserveError::Conflict(slot_id)),
                None => Err(ReserveError::NotFound(format!("slot {slot_id}"))),
            },
        }
    }

    async fn purge_before(&self, cutoff: NaiveDate) -> ReserveResult<u64> {
        if cutoff > Utc::now().date_naive() {
            return Err(ReserveError::Validation(
                "purge cutoff must not be in the future".into(),
            ));
        }
        // holds go with their slots via ON DELETE CASCADE; bookings stay
        let result = sqlx::query("DELETE FROM slots WHERE date < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl HoldRepository for PgStore {
    async fn insert_hold(&self, hold: &Hold) -> ReserveResult<()> {
        // one hold per slot; a stale row for the same slot is replaced
        sqlx::query(
            "INSERT INTO holds (id, slot_id, holder_token, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (slot_id) DO UPDATE \
             SET id = excluded.id, holder_token = excluded.holder_token, \
                 created_at = excluded.created_at, expires_at = excluded.expires_at",
        )
        .bind(hold.id)
        .bind(hold.slot_id)
        .bind(&hold.holder_token)
        .bind(hold.created_at)
        .bind(hold.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn get_hold(&self, hold_id: Uuid) -> ReserveResult<Option<Hold>> {
        let row = sqlx::query_as::<_, HoldRow>(
            "SELECT id, slot_id, holder_token, created_at, expires_at FROM holds WHERE id = $1",
        )
        .bind(hold_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.map(Hold::from))
    }

    async fn hold_for_slot(&self, slot_id: Uuid) -> ReserveResult<Option<Hold>> {
        let row = sqlx::query_as::<_, HoldRow>(
            "SELECT id, slot_id, holder_token, created_at, expires_at FROM holds WHERE slot_id = $1",
        )
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.map(Hold::from))
    }

    async fn find_hold_by_token(
        &self,
        slot_id: Uuid,
        holder_token: &str,
    ) -> ReserveResult<Option<Hold>> {
        let row = sqlx::query_as::<_, HoldRow>(
            "SELECT id, slot_id, holder_token, created_at, expires_at FROM holds \
             WHERE slot_id = $1 AND holder_token = $2",
        )
        .bind(slot_id)
        .bind(holder_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.map(Hold::from))
    }

    async fn delete_hold(&self, hold_id: Uuid) -> ReserveResult<()> {
        sqlx::query("DELETE FROM holds WHERE id = $1")
            .bind(hold_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn expired_holds(&self, now: DateTime<Utc>) -> ReserveResult<Vec<Hold>> {
        let rows = sqlx::query_as::<_, HoldRow>(
            "SELECT id, slot_id, holder_token, created_at, expires_at FROM holds \
             WHERE expires_at <= $1 ORDER BY expires_at",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Hold::from).collect())
    }
}

#[async_trait]
impl BookingRepository for PgStore {
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
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let row = sqlx::query_as::<_, SlotRow>(&format!(
            "UPDATE slots SET status = 'CONFIRMED', version = version + 1 \
             WHERE id = $1 AND status = 'HELD' AND version = $2 \
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?;

        let slot = match row {
            Some(row) => Slot::try_from(row)?,
            None => {
                // transaction drops without committing; nothing changed
                return match self.get_slot(slot_id).await? {
                    Some(_) => Err(ReserveError::Conflict(slot_id)),
                    None => Err(ReserveError::NotFound(format!("slot {slot_id}"))),
                };
            }
        };

        sqlx::query(
            "INSERT INTO bookings (id, slot_id, client_name, client_phone, client_email, \
             service_description, address, deposit_cents, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(booking.id)
        .bind(booking.slot_id)
        .bind(&booking.details.client_name)
        .bind(&booking.details.client_phone)
        .bind(&booking.details.client_email)
        .bind(&booking.details.service_description)
        .bind(&booking.details.address)
        .bind(booking.deposit_cents)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ReserveError::Conflict(slot_id)
            } else {
                map_db_err(e)
            }
        })?;

        sqlx::query("DELETE FROM holds WHERE slot_id = $1")
            .bind(slot_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        self.emit(&slot);
        Ok(slot)
    }

    async fn get_booking(&self, booking_id: Uuid) -> ReserveResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        row.map(Booking::try_from).transpose()
    }

    async fn booking_for_slot(&self, slot_id: Uuid) -> ReserveResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE slot_id = $1 AND status = 'CONFIRMED'"
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        row.map(Booking::try_from).transpose()
    }

    async fn cancel_booking(&self, booking_id: Uuid, retire_slot: bool) -> ReserveResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?;

        let booking = match row {
            Some(row) => Booking::try_from(row)?,
            None => return Err(ReserveError::NotFound(format!("booking {booking_id}"))),
        };
        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        let now = Utc::now();
        sqlx::query("UPDATE bookings SET status = 'CANCELLED', cancelled_at = $1 WHERE id = $2")
            .bind(now)
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        let next_status = if retire_slot {
            SlotStatus::Blocked
        } else {
            SlotStatus::Open
        };
        let slot_row = sqlx::query_as::<_, SlotRow>(&format!(
            "UPDATE slots SET status = $1, version = version + 1 \
             WHERE id = $2 RETURNING {SLOT_COLUMNS}"
        ))
        .bind(next_status.as_str())
        .bind(booking.slot_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;

        if let Some(row) = slot_row {
            self.emit(&Slot::try_from(row)?);
        }

        let mut cancelled = booking;
        cancelled.status = BookingStatus::Cancelled;
        cancelled.cancelled_at = Some(now);
        Ok(cancelled)
    }
}
