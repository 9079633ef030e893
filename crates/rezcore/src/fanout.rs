//! `FanOutEngine`, spec.md §4.6. `submit` resolves eligible agreements and
//! returns synchronously; the actual per-source dispatch runs in background
//! tasks so a caller polling `GetJobSince` never blocks on a slow source.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use adapters::{AdapterOffer, AdapterRegistry, AvailabilityRequest};
use chrono::{DateTime, Utc};
use common::{CoreError, CoreResult, Id};
use config::{FanoutConfig, HealthConfig};
use dal::{AgreementStore, AvailabilityStore, CompanyStore, CoverageStore, HealthStore};
use metrics::{AdapterLatencyMetric, MetricsSink};
use models::{Agreement, JobStatus, OfferOrMarker, ResultMarker, VehicleOffer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::Semaphore;

use crate::coverage::CoverageResolver;
use crate::health::HealthMonitor;

/// Raw Submit criteria, tolerant of snake_case/camelCase field names and a
/// singleton `agreement_ref` string in place of a list (spec.md §4.6 step 1).
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitCriteria {
    #[serde(alias = "pickupUnlocode")]
    pub pickup_unlocode: String,
    #[serde(alias = "dropoffUnlocode")]
    pub dropoff_unlocode: String,
    #[serde(alias = "pickupIso")]
    pub pickup_iso: DateTime<Utc>,
    #[serde(alias = "dropoffIso")]
    pub dropoff_iso: DateTime<Utc>,
    #[serde(alias = "driverAge", default)]
    pub driver_age: Option<i32>,
    #[serde(alias = "residencyCountry", default)]
    pub residency_country: Option<String>,
    #[serde(alias = "vehicleClasses", default)]
    pub vehicle_classes: Vec<String>,
    #[serde(alias = "agreementRefs", default, deserialize_with = "one_or_many")]
    pub agreement_refs: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Synchronous reply to `Submit`, spec.md §4.6 step 4.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    pub request_id: Id,
    pub expected_sources: i32,
    pub recommended_poll_ms: u64,
}

pub struct FanOutEngine {
    pool: PgPool,
    registry: Arc<AdapterRegistry>,
    metrics: Arc<dyn MetricsSink>,
    fanout: FanoutConfig,
    health_config: HealthConfig,
}

impl FanOutEngine {
    pub fn new(
        pool: PgPool,
        registry: Arc<AdapterRegistry>,
        metrics: Arc<dyn MetricsSink>,
        fanout: FanoutConfig,
        health_config: HealthConfig,
    ) -> Self {
        Self {
            pool,
            registry,
            metrics,
            fanout,
            health_config,
        }
    }

    /// `Submit`, spec.md §4.6 steps 1-4. Eligibility filtering and dispatch
    /// (steps 5-8) continue in the background after this returns.
    pub async fn submit(&self, agent_id: Id, criteria: Value) -> CoreResult<SubmitResult> {
        let normalized: SubmitCriteria = serde_json::from_value(criteria.clone())
            .map_err(|e| CoreError::InvalidArgument(format!("invalid criteria: {e}")))?;

        let agreements = AgreementStore::new(&self.pool)
            .list_active_for_agent(agent_id, &normalized.agreement_refs)
            .await?;

        let expected_sources = agreements.iter().map(|a| a.source_id).collect::<HashSet<_>>().len() as i32;

        let job_id = AvailabilityStore::new(&self.pool)
            .create_job(agent_id, criteria, expected_sources)
            .await?;

        if !agreements.is_empty() {
            self.spawn_dispatch(job_id, agreements, normalized);
        }

        Ok(SubmitResult {
            request_id: job_id,
            expected_sources,
            recommended_poll_ms: 1500,
        })
    }

    fn spawn_dispatch(&self, job_id: Id, agreements: Vec<Agreement>, criteria: SubmitCriteria) {
        let pool = self.pool.clone();
        let registry = self.registry.clone();
        let metrics = self.metrics.clone();
        let fanout = self.fanout;
        let health_config = self.health_config;

        tokio::spawn(async move {
            let coverage = CoverageResolver::new(CoverageStore::new(&pool));
            let health = HealthMonitor::new(HealthStore::new(&pool), health_config, metrics.clone());

            let mut eligible = Vec::with_capacity(agreements.len());
            for agreement in agreements {
                match is_eligible(&coverage, &health, &agreement, &criteria).await {
                    Ok(true) => eligible.push(agreement),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(agreement_id = %agreement.id, error = %e, "eligibility check failed, skipping source")
                    }
                }
            }

            if eligible.is_empty() {
                if let Err(e) = AvailabilityStore::new(&pool).mark_job_complete(job_id).await {
                    tracing::error!(%job_id, error = %e, "failed to mark empty job complete");
                }
                return;
            }

            let watchdog_pool = pool.clone();
            let sla_ms = fanout.sla_ms;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(sla_ms)).await;
                if let Ok(Some(job)) = AvailabilityStore::new(&watchdog_pool).get_job(job_id).await {
                    if job.status == JobStatus::Running {
                        tracing::warn!(%job_id, sla_ms, "fan-out exceeded global SLA, still running");
                    }
                }
            });

            let semaphore = Arc::new(Semaphore::new(fanout.concurrency.max(1)));
            let mut handles = Vec::with_capacity(eligible.len());

            for agreement in eligible {
                let semaphore = semaphore.clone();
                let pool = pool.clone();
                let registry = registry.clone();
                let metrics = metrics.clone();
                let criteria = criteria.clone();
                let timeout_ms = fanout.timeout_ms;

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                    dispatch_one(&pool, &registry, &metrics, job_id, agreement, &criteria, timeout_ms, health_config)
                        .await;
                }));
            }

            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(%job_id, error = %e, "fan-out worker panicked");
                }
            }

            if let Err(e) = AvailabilityStore::new(&pool).mark_job_complete(job_id).await {
                tracing::error!(%job_id, error = %e, "failed to mark job complete");
            }
        });
    }
}

/// `Allowed(pickup) ∧ Allowed(dropoff) ∧ ¬isExcluded(sourceId)` — spec.md
/// §4.6 step 5.
async fn is_eligible(
    coverage: &CoverageResolver<'_>,
    health: &HealthMonitor<'_>,
    agreement: &Agreement,
    criteria: &SubmitCriteria,
) -> CoreResult<bool> {
    if health.is_excluded(agreement.source_id).await? {
        return Ok(false);
    }
    if !coverage
        .allowed(agreement.source_id, agreement.id, &criteria.pickup_unlocode)
        .await?
    {
        return Ok(false);
    }
    coverage
        .allowed(agreement.source_id, agreement.id, &criteria.dropoff_unlocode)
        .await
}

/// One eligible source's full round trip: call, record health sample,
/// append the result (or a marker on timeout/failure). Isolated per task —
/// nothing here propagates an error out to the rest of the fan-out.
async fn dispatch_one(
    pool: &PgPool,
    registry: &AdapterRegistry,
    metrics: &Arc<dyn MetricsSink>,
    job_id: Id,
    agreement: Agreement,
    criteria: &SubmitCriteria,
    timeout_ms: u64,
    health_config: HealthConfig,
) {
    let source_id = agreement.source_id;

    let endpoint = match CompanyStore::new(pool).get(source_id).await {
        Ok(Some(company)) => company.endpoint,
        Ok(None) => None,
        Err(e) => {
            tracing::error!(%source_id, error = %e, "failed to load source company");
            None
        }
    };

    let Some(endpoint) = endpoint else {
        record_marker(pool, job_id, source_id, ResultMarker::SourceError, false).await;
        return;
    };

    let adapter = match registry.get_or_init(source_id, &endpoint).await {
        Ok(adapter) => adapter,
        Err(e) => {
            tracing::warn!(%source_id, error = %e, "adapter construction failed");
            record_marker(pool, job_id, source_id, ResultMarker::SourceError, false).await;
            return;
        }
    };

    let request = AvailabilityRequest {
        agreement_ref: agreement.agreement_ref.clone(),
        pickup_unlocode: criteria.pickup_unlocode.clone(),
        dropoff_unlocode: criteria.dropoff_unlocode.clone(),
        pickup_iso: criteria.pickup_iso,
        dropoff_iso: criteria.dropoff_iso,
        driver_age: criteria.driver_age,
        residency_country: criteria.residency_country.clone(),
        vehicle_classes: criteria.vehicle_classes.clone(),
    };

    let started = tokio::time::Instant::now();
    let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), adapter.availability(&request)).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let (items, success, timed_out) = match outcome {
        Ok(Ok(offers)) => (offers.into_iter().map(to_offer_item).collect::<Vec<_>>(), true, false),
        Ok(Err(e)) => {
            tracing::warn!(%source_id, error = %e, "source availability call failed");
            record_health_and_metrics(pool, metrics, health_config, source_id, latency_ms, false).await;
            record_marker(pool, job_id, source_id, ResultMarker::SourceError, false).await;
            return;
        }
        Err(_) => {
            tracing::warn!(%source_id, timeout_ms, "source availability call timed out");
            (Vec::new(), false, true)
        }
    };

    record_health_and_metrics(pool, metrics, health_config, source_id, latency_ms, success).await;

    if let Err(e) = AvailabilityStore::new(pool)
        .append_partial(job_id, source_id, items, timed_out)
        .await
    {
        tracing::error!(%job_id, %source_id, error = %e, "failed to append availability results");
    }
}

async fn record_health_and_metrics(
    pool: &PgPool,
    metrics: &Arc<dyn MetricsSink>,
    health_config: HealthConfig,
    source_id: Id,
    latency_ms: u64,
    success: bool,
) {
    let health = HealthMonitor::new(HealthStore::new(pool), health_config, metrics.clone());
    if let Err(e) = health.record_metric(source_id, latency_ms, success).await {
        tracing::error!(%source_id, error = %e, "failed to record health sample");
    }

    metrics
        .record(
            AdapterLatencyMetric {
                ts: metrics::Timestamp::now(),
                source_id,
                operation: "availability".to_string(),
                latency_ms,
                success,
            }
            .into(),
        )
        .await;
}

async fn record_marker(pool: &PgPool, job_id: Id, source_id: Id, marker: ResultMarker, timed_out: bool) {
    let item = OfferOrMarker::Marker { error: marker, message: None };
    if let Err(e) = AvailabilityStore::new(pool)
        .append_partial(job_id, source_id, vec![item], timed_out)
        .await
    {
        tracing::error!(%job_id, %source_id, error = %e, "failed to record source failure marker");
    }
}

fn to_offer_item(offer: AdapterOffer) -> OfferOrMarker {
    OfferOrMarker::Offer(VehicleOffer {
        supplier_offer_ref: offer.supplier_offer_ref,
        vehicle_class: offer.vehicle_class,
        make_model: offer.make_model.unwrap_or_default(),
        currency: offer.currency,
        total_price: format!("{:.2}", offer.total_price),
        availability_status: offer.availability_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_camel_case_and_singleton_ref() {
        let raw = serde_json::json!({
            "pickupUnlocode": "USLAX",
            "dropoffUnlocode": "USLAX",
            "pickupIso": "2026-08-01T10:00:00Z",
            "dropoffIso": "2026-08-03T10:00:00Z",
            "agreementRefs": "AGR-1",
        });
        let parsed: SubmitCriteria = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.pickup_unlocode, "USLAX");
        assert_eq!(parsed.agreement_refs, vec!["AGR-1".to_string()]);
    }

    #[test]
    fn accepts_snake_case_and_ref_list() {
        let raw = serde_json::json!({
            "pickup_unlocode": "USLAX",
            "dropoff_unlocode": "USNYC",
            "pickup_iso": "2026-08-01T10:00:00Z",
            "dropoff_iso": "2026-08-03T10:00:00Z",
            "agreement_refs": ["AGR-1", "AGR-2"],
        });
        let parsed: SubmitCriteria = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.dropoff_unlocode, "USNYC");
        assert_eq!(parsed.agreement_refs, vec!["AGR-1".to_string(), "AGR-2".to_string()]);
    }

    #[test]
    fn missing_agreement_refs_defaults_empty() {
        let raw = serde_json::json!({
            "pickup_unlocode": "USLAX",
            "dropoff_unlocode": "USNYC",
            "pickup_iso": "2026-08-01T10:00:00Z",
            "dropoff_iso": "2026-08-03T10:00:00Z",
        });
        let parsed: SubmitCriteria = serde_json::from_value(raw).unwrap();
        assert!(parsed.agreement_refs.is_empty());
    }
}
