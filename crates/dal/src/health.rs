use chrono::Utc;
use common::{CoreResult, Id};
use config::HealthConfig;
use models::SourceHealth;
use sqlx::PgPool;

pub struct HealthStore<'a> {
    pool: &'a PgPool,
}

impl<'a> HealthStore<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, source_id: Id) -> CoreResult<SourceHealth> {
        let row = sqlx::query_as::<_, SourceHealth>(
            "SELECT source_id, sample_count, slow_count, slow_rate, backoff_level, excluded_until, last_reset_by, last_reset_at
             FROM source_health WHERE source_id = $1",
        )
        .bind(source_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.unwrap_or_else(|| SourceHealth::fresh(source_id)))
    }

    pub async fn list(&self) -> CoreResult<Vec<SourceHealth>> {
        let rows = sqlx::query_as::<_, SourceHealth>(
            "SELECT source_id, sample_count, slow_count, slow_rate, backoff_level, excluded_until, last_reset_by, last_reset_at
             FROM source_health",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Records one sample and recomputes backoff under a per-`source_id`
    /// row lock, so concurrent fan-out workers never race the update
    /// (spec.md §4.4, §5 "SourceHealth: writes per sourceId are serialized").
    pub async fn record_sample(
        &self,
        source_id: Id,
        latency_ms: u64,
        cfg: &HealthConfig,
    ) -> CoreResult<SourceHealth> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO source_health (source_id) VALUES ($1) ON CONFLICT (source_id) DO NOTHING",
        )
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

        let mut current = sqlx::query_as::<_, SourceHealth>(
            "SELECT source_id, sample_count, slow_count, slow_rate, backoff_level, excluded_until, last_reset_by, last_reset_at
             FROM source_health WHERE source_id = $1 FOR UPDATE",
        )
        .bind(source_id)
        .fetch_one(&mut *tx)
        .await?;

        current.sample_count += 1;
        if latency_ms > cfg.slow_threshold_ms {
            current.slow_count += 1;
        }
        current.slow_rate = current.slow_count as f64 / current.sample_count as f64;

        if current.sample_count >= cfg.min_samples_for_backoff as i64 && current.slow_rate > cfg.slow_rate_threshold {
            current.backoff_level = (current.backoff_level + 1).min(10);
            let hours = 2u64.saturating_pow(current.backoff_level as u32).min(cfg.max_backoff_hours);
            current.excluded_until = Some(Utc::now() + chrono::Duration::hours(hours as i64));
        } else if current.slow_rate <= cfg.slow_rate_threshold && current.backoff_level > 0 {
            current.backoff_level = 0;
            current.excluded_until = None;
        }

        sqlx::query(
            "UPDATE source_health SET sample_count = $2, slow_count = $3, slow_rate = $4, backoff_level = $5, excluded_until = $6
             WHERE source_id = $1",
        )
        .bind(source_id)
        .bind(current.sample_count)
        .bind(current.slow_count)
        .bind(current.slow_rate)
        .bind(current.backoff_level)
        .bind(current.excluded_until)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(current)
    }

    /// Clears `excluded_until` lazily once it has passed, without touching
    /// the other counters (spec.md §4.4 "clear it lazily on the next query").
    pub async fn clear_lapsed_exclusion(&self, source_id: Id) -> CoreResult<()> {
        sqlx::query(
            "UPDATE source_health SET excluded_until = NULL
             WHERE source_id = $1 AND excluded_until IS NOT NULL AND excluded_until <= now()",
        )
        .bind(source_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn reset(&self, source_id: Id, reset_by: &str) -> CoreResult<SourceHealth> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO source_health (source_id, sample_count, slow_count, slow_rate, backoff_level, excluded_until, last_reset_by, last_reset_at)
             VALUES ($1, 0, 0, 0, 0, NULL, $2, $3)
             ON CONFLICT (source_id) DO UPDATE SET
                sample_count = 0, slow_count = 0, slow_rate = 0, backoff_level = 0,
                excluded_until = NULL, last_reset_by = $2, last_reset_at = $3",
        )
        .bind(source_id)
        .bind(reset_by)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.get(source_id).await
    }
}
