use chrono::{DateTime, Utc};
use common::Id;
use serde::{Deserialize, Serialize};

/// Parameters for a single source's `Availability` call (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub agreement_ref: String,
    pub pickup_unlocode: String,
    pub dropoff_unlocode: String,
    pub pickup_iso: DateTime<Utc>,
    pub dropoff_iso: DateTime<Utc>,
    pub driver_age: Option<i32>,
    pub residency_country: Option<String>,
    pub vehicle_classes: Vec<String>,
}

/// A single vehicle offer returned by a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterOffer {
    pub supplier_offer_ref: String,
    pub vehicle_class: String,
    pub make_model: Option<String>,
    pub currency: String,
    pub total_price: f64,
    pub availability_status: String,
}

/// Payload for `BookingCreate`/`BookingModify` — always carries
/// `agreement_ref`; rental/customer/payment detail is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPayload {
    pub agreement_ref: String,
    pub supplier_offer_ref: Option<String>,
    pub idempotency_key: Option<String>,
    pub supplier_booking_ref: Option<String>,
    pub pickup_unlocode: Option<String>,
    pub dropoff_unlocode: Option<String>,
    pub pickup_iso: Option<DateTime<Utc>>,
    pub dropoff_iso: Option<DateTime<Utc>>,
    pub vehicle_class: Option<String>,
    pub customer_info: Option<serde_json::Value>,
    pub payment_info: Option<serde_json::Value>,
}

/// Result of a booking-scoped call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingAck {
    pub supplier_booking_ref: String,
    pub status: String,
}

/// Identifies the source a `SourceAdapter` was built for — used for
/// deterministic offer-ref synthesis and logging.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext {
    pub source_id: Id,
}
