//! Metrics error module.
//!
//! Defines [`MetricError`], the errors that can occur sending a metric
//! message through a [`crate::MetricsSink`]. Narrower than the teacher's
//! version: no `axum::IntoResponse` impl, since a metrics-send failure is
//! never surfaced directly to an HTTP caller (it's logged and dropped —
//! see [`crate::TracingSink`]).
use thiserror::Error;

use crate::message::MetricMessage;

#[derive(Debug, Clone, Error)]
pub enum MetricError {
    #[error("failed to send metric through channel: {0:?}")]
    SendError(MetricMessage),
}
