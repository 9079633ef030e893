//! The background maintenance ticker (SPEC_FULL.md §C.3/§C.4): periodically
//! purges expired availability jobs (spec.md §4.5) and sweeps agreements
//! whose `OFFERED` state has outlived `offer_ttl` into `EXPIRED` (spec.md §3
//! agreement state machine). Grounded on the teacher's supervised
//! background-task shape (`crates/metrics`'s `MetricConsumer::run`, a
//! `tokio::spawn`'d loop cancelled via a `CancellationToken`) rather than an
//! externally-invoked cron.
use std::time::Duration;

use dal::{AgreementStore, AvailabilityStore};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// How often the ticker wakes up to check for expired jobs and stale offers.
/// Independent of the TTLs themselves, which are configured separately.
const TICK_INTERVAL: Duration = Duration::from_secs(60);

pub struct MaintenanceTicker {
    cancel: CancellationToken,
}

impl MaintenanceTicker {
    /// Spawns the ticker against `pool`, running until [`MaintenanceTicker::stop`]
    /// is called or the process exits.
    pub fn spawn(pool: PgPool, job_ttl_seconds: u64, offer_ttl_seconds: u64) -> Self {
        let cancel = CancellationToken::new();
        let task = MaintenanceTask {
            pool,
            job_ttl: Duration::from_secs(job_ttl_seconds),
            offer_ttl_seconds: offer_ttl_seconds as i64,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run());
        Self { cancel }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

struct MaintenanceTask {
    pool: PgPool,
    job_ttl: Duration,
    offer_ttl_seconds: i64,
    cancel: CancellationToken,
}

impl MaintenanceTask {
    async fn run(self) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => self.sweep_once().await,
            }
        }
    }

    async fn sweep_once(&self) {
        match AvailabilityStore::new(&self.pool).purge_expired(self.job_ttl).await {
            Ok(purged) if purged > 0 => tracing::info!(purged, "purged expired availability jobs"),
            Ok(_) => {}
            Err(error) => tracing::error!(%error, "availability job purge failed"),
        }

        match AgreementStore::new(&self.pool).expire_stale_offers(self.offer_ttl_seconds).await {
            Ok(expired) if !expired.is_empty() => {
                tracing::info!(count = expired.len(), "expired stale agreement offers")
            }
            Ok(_) => {}
            Err(error) => tracing::error!(%error, "agreement offer expiry sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_is_shorter_than_the_smallest_reasonable_ttl() {
        assert!(TICK_INTERVAL < Duration::from_secs(600));
    }
}
