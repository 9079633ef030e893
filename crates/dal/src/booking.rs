use chrono::Utc;
use common::{CoreResult, Id};
use models::{Booking, BookingHistoryEvent, BookingStatus, EventType, HistoryActor};
use serde_json::Value;
use sqlx::PgPool;

pub struct BookingStore<'a> {
    pool: &'a PgPool,
}

const COLUMNS: &str = "id, agent_id, source_id, agreement_ref, supplier_booking_ref, agent_booking_ref,
    idempotency_key, status, pickup_unlocode, dropoff_unlocode, pickup_iso, dropoff_iso, vehicle_class,
    make_model, rate_plan, driver_age, residency_country, customer_info, payment_info, payload_snapshot,
    created_at, updated_at";

impl<'a> BookingStore<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Returns the booking already committed for `(agent_id, scope, key)`,
    /// if any — the idempotent-replay path of spec.md §4.7.1 step 3.
    pub async fn find_idempotent(&self, agent_id: Id, scope: &str, key: &str) -> CoreResult<Option<Booking>> {
        let booking_id: Option<(Id,)> = sqlx::query_as(
            "SELECT booking_id FROM idempotency_keys WHERE agent_id = $1 AND scope = $2 AND key = $3",
        )
        .bind(agent_id)
        .bind(scope)
        .bind(key)
        .fetch_optional(self.pool)
        .await?;

        match booking_id {
            Some((id,)) => self.get(id).await,
            None => Ok(None),
        }
    }

    pub async fn get(&self, id: Id) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, Booking>(&format!("SELECT {COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_supplier_ref(&self, source_id: Id, supplier_booking_ref: &str) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {COLUMNS} FROM bookings WHERE source_id = $1 AND supplier_booking_ref = $2"
        ))
        .bind(source_id)
        .bind(supplier_booking_ref)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Inserts `booking` and its idempotency-key row in one transaction, so
    /// a concurrent duplicate Create can never observe a booking without
    /// its key (spec.md invariant v).
    pub async fn insert_with_idempotency_key(
        &self,
        booking: &Booking,
        scope: &str,
        key: &str,
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO bookings ({COLUMNS}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22)"
        ))
        .bind(booking.id)
        .bind(booking.agent_id)
        .bind(booking.source_id)
        .bind(&booking.agreement_ref)
        .bind(&booking.supplier_booking_ref)
        .bind(&booking.agent_booking_ref)
        .bind(&booking.idempotency_key)
        .bind(booking.status.to_string())
        .bind(&booking.pickup_unlocode)
        .bind(&booking.dropoff_unlocode)
        .bind(booking.pickup_iso)
        .bind(booking.dropoff_iso)
        .bind(&booking.vehicle_class)
        .bind(&booking.make_model)
        .bind(&booking.rate_plan)
        .bind(booking.driver_age)
        .bind(&booking.residency_country)
        .bind(&booking.customer_info)
        .bind(&booking.payment_info)
        .bind(&booking.payload_snapshot)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO idempotency_keys (agent_id, scope, key, booking_id) VALUES ($1, $2, $3, $4)",
        )
        .bind(booking.agent_id)
        .bind(scope)
        .bind(key)
        .bind(booking.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Applies the supplier's returned status (and, for Modify, the
    /// provided rental fields) to the booking row (spec.md §4.7.2 step 5).
    pub async fn apply_update(
        &self,
        id: Id,
        status: BookingStatus,
        supplier_booking_ref: Option<String>,
        pickup_unlocode: Option<String>,
        dropoff_unlocode: Option<String>,
        pickup_iso: Option<chrono::DateTime<Utc>>,
        dropoff_iso: Option<chrono::DateTime<Utc>>,
        vehicle_class: Option<String>,
        payload_snapshot: Value,
    ) -> CoreResult<Booking> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| common::CoreError::NotFound(format!("booking {id}")))?;

        let updated = Booking {
            status,
            supplier_booking_ref: supplier_booking_ref.or(existing.supplier_booking_ref),
            pickup_unlocode: pickup_unlocode.unwrap_or(existing.pickup_unlocode),
            dropoff_unlocode: dropoff_unlocode.unwrap_or(existing.dropoff_unlocode),
            pickup_iso: pickup_iso.unwrap_or(existing.pickup_iso),
            dropoff_iso: dropoff_iso.unwrap_or(existing.dropoff_iso),
            vehicle_class: vehicle_class.unwrap_or(existing.vehicle_class),
            payload_snapshot,
            updated_at: Utc::now(),
            ..existing
        };

        sqlx::query(
            "UPDATE bookings SET status = $2, supplier_booking_ref = $3, pickup_unlocode = $4,
             dropoff_unlocode = $5, pickup_iso = $6, dropoff_iso = $7, vehicle_class = $8,
             payload_snapshot = $9, updated_at = $10
             WHERE id = $1",
        )
        .bind(id)
        .bind(updated.status.to_string())
        .bind(&updated.supplier_booking_ref)
        .bind(&updated.pickup_unlocode)
        .bind(&updated.dropoff_unlocode)
        .bind(updated.pickup_iso)
        .bind(updated.dropoff_iso)
        .bind(&updated.vehicle_class)
        .bind(&updated.payload_snapshot)
        .bind(updated.updated_at)
        .execute(self.pool)
        .await?;

        Ok(updated)
    }

    /// Journal write. Failures are logged and swallowed by the caller
    /// (`rezcore::booking`), never surfaced as an operation failure
    /// (spec.md §4.7.3, §7 "Propagation").
    pub async fn append_history(
        &self,
        booking_id: Id,
        event_type: EventType,
        before_state: Option<Value>,
        after_state: Option<Value>,
        changes: Option<Value>,
        actor: Option<String>,
        source: HistoryActor,
    ) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO booking_history (id, booking_id, event_type, before_state, after_state, changes, actor, source, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Id::new())
        .bind(booking_id)
        .bind(event_type.to_string())
        .bind(before_state)
        .bind(after_state)
        .bind(changes)
        .bind(actor)
        .bind(source.to_string())
        .bind(Option::<Value>::None)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_history(&self, booking_id: Id) -> CoreResult<Vec<BookingHistoryEvent>> {
        let rows = sqlx::query_as::<_, BookingHistoryEvent>(
            "SELECT id, booking_id, event_type, before_state, after_state, changes, actor, source, timestamp, metadata
             FROM booking_history WHERE booking_id = $1 ORDER BY timestamp ASC",
        )
        .bind(booking_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
