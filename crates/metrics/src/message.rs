//! [`MetricMessage`], a wrapper around the distinct metric structs defined
//! in [`crate::metrics`]. Grounded on the teacher's `MetricMessage` enum
//! shape; replaces the teacher's `#[enum_dispatch(MetricWrapper)]` +
//! `telegraf::Client` write path with a plain `From` per variant, since the
//! sink dispatch now happens through `MetricsSink` instead.
use serde::{Deserialize, Serialize};

use crate::metrics::{
    AdapterLatencyMetric, BookingOperationMetric, SourceExclusionMetric, VerificationOutcomeMetric,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MetricMessage {
    AdapterLatency(AdapterLatencyMetric),
    BookingOperation(BookingOperationMetric),
    VerificationOutcome(VerificationOutcomeMetric),
    SourceExclusion(SourceExclusionMetric),
}

impl From<AdapterLatencyMetric> for MetricMessage {
    fn from(m: AdapterLatencyMetric) -> Self {
        MetricMessage::AdapterLatency(m)
    }
}

impl From<BookingOperationMetric> for MetricMessage {
    fn from(m: BookingOperationMetric) -> Self {
        MetricMessage::BookingOperation(m)
    }
}

impl From<VerificationOutcomeMetric> for MetricMessage {
    fn from(m: VerificationOutcomeMetric) -> Self {
        MetricMessage::VerificationOutcome(m)
    }
}

impl From<SourceExclusionMetric> for MetricMessage {
    fn from(m: SourceExclusionMetric) -> Self {
        MetricMessage::SourceExclusion(m)
    }
}
