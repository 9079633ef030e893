//! `HealthMonitor`, spec.md §4.4.
//!
//! A thin wrapper over `dal::HealthStore`: the exclusion/backoff math
//! itself lives in the store (it must run under the same per-source row
//! lock as the read that feeds `isExcluded`), this module is the public
//! surface named in the spec and the place a `metrics::MetricsSink` is fed.
use std::sync::Arc;

use chrono::Utc;
use common::{CoreResult, Id};
use config::HealthConfig;
use dal::HealthStore;
use metrics::{MetricsSink, SourceExclusionMetric};
use models::SourceHealth;

pub struct HealthMonitor<'a> {
    store: HealthStore<'a>,
    config: HealthConfig,
    sink: Arc<dyn MetricsSink>,
}

impl<'a> HealthMonitor<'a> {
    pub fn new(store: HealthStore<'a>, config: HealthConfig, sink: Arc<dyn MetricsSink>) -> Self {
        Self { store, config, sink }
    }

    /// `recordMetric(sourceId, latencyMs, success)` — spec.md §4.4. `success`
    /// is accepted for call-site symmetry with the spec text but does not
    /// enter the slow-rate computation; only latency against
    /// `SLOW_THRESHOLD_MS` does (a failed call that returns fast is not a
    /// "slow" sample by this definition).
    pub async fn record_metric(&self, source_id: Id, latency_ms: u64, _success: bool) -> CoreResult<SourceHealth> {
        let before = self.store.get(source_id).await?;
        let after = self.store.record_sample(source_id, latency_ms, &self.config).await?;

        let was_excluded = before.is_excluded_at(Utc::now());
        let is_excluded = after.is_excluded_at(Utc::now());
        if was_excluded != is_excluded {
            self.sink
                .record(
                    SourceExclusionMetric {
                        ts: metrics::Timestamp::now(),
                        source_id,
                        excluded: is_excluded,
                        backoff_level: after.backoff_level,
                    }
                    .into(),
                )
                .await;
        }

        Ok(after)
    }

    /// `isExcluded(sourceId)` — spec.md §4.4. Lazily clears a lapsed
    /// exclusion before answering, matching "if it has passed, clear it
    /// lazily on the next query".
    pub async fn is_excluded(&self, source_id: Id) -> CoreResult<bool> {
        self.store.clear_lapsed_exclusion(source_id).await?;
        let health = self.store.get(source_id).await?;
        Ok(health.is_excluded_at(Utc::now()))
    }

    pub async fn get(&self, source_id: Id) -> CoreResult<SourceHealth> {
        self.store.clear_lapsed_exclusion(source_id).await?;
        self.store.get(source_id).await
    }

    pub async fn list(&self) -> CoreResult<Vec<SourceHealth>> {
        self.store.list().await
    }

    /// Admin `reset(sourceId)` — spec.md §4.4.
    pub async fn reset(&self, source_id: Id, reset_by: &str) -> CoreResult<SourceHealth> {
        let result = self.store.reset(source_id, reset_by).await?;
        self.sink
            .record(
                SourceExclusionMetric {
                    ts: metrics::Timestamp::now(),
                    source_id,
                    excluded: false,
                    backoff_level: 0,
                }
                .into(),
            )
            .await;
        Ok(result)
    }
}
