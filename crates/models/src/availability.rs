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
pub enum JobStatus {
    Running,
    Complete,
}

/// `AvailabilityJob` of spec.md §3. One per Submit.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, JsonSchema)]
pub struct AvailabilityJob {
    pub id: Id,
    pub agent_id: Id,
    pub criteria: Value,
    pub expected_sources: i32,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// A successfully returned vehicle offer, as defined by the adapter contract
/// of spec.md §4.1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VehicleOffer {
    pub supplier_offer_ref: String,
    pub vehicle_class: String,
    pub make_model: String,
    pub currency: String,
    pub total_price: String,
    pub availability_status: String,
}

/// The synthetic marker recorded in place of an offer when a source call
/// times out, fails, or returns nothing (spec.md §3 `AvailabilityResult`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, strum_macros::Display, JsonSchema)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultMarker {
    Timeout,
    SourceError,
    NoResult,
}

/// `AvailabilityResult.offer`: either a real offer or a synthetic marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OfferOrMarker {
    Offer(VehicleOffer),
    Marker {
        error: ResultMarker,
        message: Option<String>,
    },
}

/// `AvailabilityResult` of spec.md §3. `seq` is allocated by the store at
/// append time and is strictly monotonic per job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AvailabilityResult {
    pub job_id: Id,
    pub seq: i64,
    pub source_id: Id,
    pub offer: OfferOrMarker,
}
