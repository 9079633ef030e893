use chrono::{DateTime, Utc};
use common::Id;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, strum_macros::Display, JsonSchema,
)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Requested,
    Confirmed,
    Cancelled,
    Failed,
}

/// `Booking` of spec.md §3. Exclusively owned by its `agent_id`; mutable
/// only via `rezcore::booking::BookingCore` operations.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, JsonSchema)]
pub struct Booking {
    pub id: Id,
    pub agent_id: Id,
    pub source_id: Id,
    pub agreement_ref: String,
    pub supplier_booking_ref: Option<String>,
    pub agent_booking_ref: Option<String>,
    pub idempotency_key: Option<String>,
    pub status: BookingStatus,

    pub pickup_unlocode: String,
    pub dropoff_unlocode: String,
    pub pickup_iso: DateTime<Utc>,
    pub dropoff_iso: DateTime<Utc>,
    pub vehicle_class: String,
    pub make_model: Option<String>,
    pub rate_plan: Option<String>,
    pub driver_age: i32,
    pub residency_country: String,

    pub customer_info: Option<Value>,
    pub payment_info: Option<Value>,
    pub payload_snapshot: Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `(agentId, scope, key) -> responseRef` row, spec.md §3. Used to replay
/// prior responses on Create retries.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdempotencyKey {
    pub agent_id: Id,
    pub scope: String,
    pub key: String,
    pub booking_id: Id,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, strum_macros::Display, JsonSchema,
)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Created,
    Modified,
    Cancelled,
    StatusChanged,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, strum_macros::Display, JsonSchema,
)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryActor {
    Agent,
    Source,
    System,
    Admin,
}

/// `BookingHistory` of spec.md §3: an append-only journal, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, JsonSchema)]
pub struct BookingHistoryEvent {
    pub id: Id,
    pub booking_id: Id,
    pub event_type: EventType,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
    pub changes: Option<Value>,
    pub actor: Option<String>,
    pub source: HistoryActor,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<Value>,
}
