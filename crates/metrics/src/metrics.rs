//! Metric structs for the reservation middleware. Each corresponds to one
//! observable event named in SPEC_FULL.md's ambient-stack section: adapter
//! latency samples, booking operation counts, agreement verification
//! outcomes, and source exclusion transitions.
//!
//! Grounded on the shape of the teacher's `crates/metrics/src/metrics.rs`
//! (one plain struct per measurement, a shared `Timestamp`), with the
//! `telegraf`-specific `#[telegraf(tag/field)]` annotations dropped since
//! this crate no longer targets Telegraf (see `DESIGN.md`).
use chrono::{DateTime, Utc};
use common::Id;
use serde::{Deserialize, Serialize};

/// Wraps [`DateTime<Utc>`] so every metric struct carries a timestamp field
/// with a consistent `Default` (the teacher's `Timestamp` does the same,
/// there to satisfy `telegraf::Metric`'s `Into<u64>` bound; here it's just
/// a convenience).
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(Utc::now())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::now()
    }
}

/// One `Availability`/booking-scoped adapter call's observed latency, the
/// raw input to `HealthMonitor::record_sample` (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterLatencyMetric {
    #[serde(default)]
    pub ts: Timestamp,
    pub source_id: Id,
    pub operation: String,
    pub latency_ms: u64,
    pub success: bool,
}

/// One completed booking operation (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingOperationMetric {
    #[serde(default)]
    pub ts: Timestamp,
    pub agent_id: Id,
    pub source_id: Id,
    pub operation: String,
    pub outcome: String,
}

/// One agreement state transition attempt, successful or rejected
/// (spec.md §3 invariant iv).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcomeMetric {
    #[serde(default)]
    pub ts: Timestamp,
    pub agreement_id: Id,
    pub from_status: String,
    pub to_status: String,
    pub accepted: bool,
}

/// A source's health crossing the exclusion boundary in either direction
/// (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceExclusionMetric {
    #[serde(default)]
    pub ts: Timestamp,
    pub source_id: Id,
    pub excluded: bool,
    pub backoff_level: i32,
}
