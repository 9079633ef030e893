use chrono::{DateTime, Utc};
use common::Id;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `SourceHealth` of spec.md §3. Derived state; rebuildable from future
/// samples (see `rezcore::health::HealthMonitor`).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, JsonSchema)]
pub struct SourceHealth {
    pub source_id: Id,
    pub sample_count: i64,
    pub slow_count: i64,
    pub slow_rate: f64,
    pub backoff_level: i32,
    pub excluded_until: Option<DateTime<Utc>>,
    pub last_reset_by: Option<String>,
    pub last_reset_at: Option<DateTime<Utc>>,
}

impl SourceHealth {
    pub fn fresh(source_id: Id) -> Self {
        Self {
            source_id,
            sample_count: 0,
            slow_count: 0,
            slow_rate: 0.0,
            backoff_level: 0,
            excluded_until: None,
            last_reset_by: None,
            last_reset_at: None,
        }
    }

    pub fn is_excluded_at(&self, now: DateTime<Utc>) -> bool {
        self.excluded_until.is_some_and(|until| until > now)
    }
}
