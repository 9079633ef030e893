use std::time::Duration;

use common::{CoreResult, Id};
use models::{AvailabilityJob, AvailabilityResult, JobStatus, OfferOrMarker, ResultMarker};
use serde_json::Value;
use sqlx::PgPool;

pub struct AvailabilityStore<'a> {
    pool: &'a PgPool,
}

/// Result of a long-poll `GetJobSince`, spec.md §4.5.
#[derive(Debug, Clone)]
pub struct JobSince {
    pub status: JobStatus,
    pub new_items: Vec<AvailabilityResult>,
    pub last_seq: i64,
    pub responses_received: i64,
    pub total_expected: i32,
    pub timed_out_sources: Vec<Id>,
    pub aggregate_etag: String,
}

impl<'a> AvailabilityStore<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_job(&self, agent_id: Id, criteria: Value, expected_sources: i32) -> CoreResult<Id> {
        let id = Id::new();
        let status = if expected_sources > 0 {
            JobStatus::Running
        } else {
            JobStatus::Complete
        };

        sqlx::query(
            "INSERT INTO availability_jobs (id, agent_id, criteria, expected_sources, status)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(agent_id)
        .bind(criteria)
        .bind(expected_sources)
        .bind(status.to_string())
        .execute(self.pool)
        .await?;

        Ok(id)
    }

    /// Allocates a contiguous block of `seq` values under `FOR UPDATE` on the
    /// job row, so concurrent appends from parallel fan-out workers never
    /// collide and commit order equals seq order (spec.md §4.5/§5, strategy
    /// (a) of SPEC_FULL.md/spec.md §9).
    pub async fn append_partial(
        &self,
        job_id: Id,
        source_id: Id,
        items: Vec<OfferOrMarker>,
        timed_out: bool,
    ) -> CoreResult<Vec<i64>> {
        let items = if items.is_empty() {
            let marker = if timed_out {
                ResultMarker::Timeout
            } else {
                ResultMarker::NoResult
            };
            vec![OfferOrMarker::Marker {
                error: marker,
                message: None,
            }]
        } else {
            items
        };

        let mut tx = self.pool.begin().await?;

        let (next_seq,): (i64,) =
            sqlx::query_as("SELECT next_seq FROM availability_jobs WHERE id = $1 FOR UPDATE")
                .bind(job_id)
                .fetch_one(&mut *tx)
                .await?;

        let mut seqs = Vec::with_capacity(items.len());
        let mut seq = next_seq;
        for item in &items {
            let offer = serde_json::to_value(item).expect("OfferOrMarker always serializes");
            sqlx::query("INSERT INTO availability_results (job_id, seq, source_id, offer) VALUES ($1, $2, $3, $4)")
                .bind(job_id)
                .bind(seq)
                .bind(source_id)
                .bind(offer)
                .execute(&mut *tx)
                .await?;
            seqs.push(seq);
            seq += 1;
        }

        sqlx::query("UPDATE availability_jobs SET next_seq = $2 WHERE id = $1")
            .bind(job_id)
            .bind(seq)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(seqs)
    }

    pub async fn mark_job_complete(&self, job_id: Id) -> CoreResult<()> {
        sqlx::query("UPDATE availability_jobs SET status = 'COMPLETE' WHERE id = $1")
            .bind(job_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_job(&self, job_id: Id) -> CoreResult<Option<AvailabilityJob>> {
        let row = sqlx::query_as::<_, AvailabilityJob>(
            "SELECT id, agent_id, criteria, expected_sources, status, created_at FROM availability_jobs WHERE id = $1",
        )
        .bind(job_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Long-poll read, spec.md §4.5: sleeps in short slices until new rows
    /// arrive, the job completes, or `wait_ms` (clamped to `[0, POLL_WAIT_MS_MAX]`)
    /// elapses.
    pub async fn get_since(&self, job_id: Id, since_seq: i64, wait_ms: u64) -> CoreResult<JobSince> {
        let poll_cfg = config::settings().poll;
        let wait_ms = wait_ms.min(poll_cfg.wait_ms_max);
        let step = Duration::from_millis(poll_cfg.step_ms.min(200));
        let deadline = tokio::time::Instant::now() + Duration::from_millis(wait_ms);

        loop {
            let snapshot = self.read_since_once(job_id, since_seq, poll_cfg.batch).await?;

            let should_return = !snapshot.new_items.is_empty()
                || snapshot.status == JobStatus::Complete
                || wait_ms == 0
                || tokio::time::Instant::now() >= deadline;

            if should_return {
                return Ok(snapshot);
            }

            tokio::time::sleep(step.min(deadline - tokio::time::Instant::now())).await;
        }
    }

    async fn read_since_once(&self, job_id: Id, since_seq: i64, batch: usize) -> CoreResult<JobSince> {
        let job = self
            .get_job(job_id)
            .await?
            .ok_or_else(|| common::CoreError::NotFound(format!("job {job_id}")))?;

        let rows: Vec<(i64, Id, Value)> = sqlx::query_as(
            "SELECT seq, source_id, offer FROM availability_results
             WHERE job_id = $1 AND seq > $2 ORDER BY seq ASC LIMIT $3",
        )
        .bind(job_id)
        .bind(since_seq)
        .bind(batch as i64)
        .fetch_all(self.pool)
        .await?;

        let new_items: Vec<AvailabilityResult> = rows
            .into_iter()
            .map(|(seq, source_id, offer)| AvailabilityResult {
                job_id,
                seq,
                source_id,
                offer: serde_json::from_value(offer).expect("stored offer is always valid JSON"),
            })
            .collect();

        let last_seq = new_items.last().map(|r| r.seq).unwrap_or(since_seq);

        let (responses_received,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT source_id) FROM availability_results WHERE job_id = $1")
                .bind(job_id)
                .fetch_one(self.pool)
                .await?;

        let timed_out_sources: Vec<(Id,)> = sqlx::query_as(
            "SELECT DISTINCT source_id FROM availability_results
             WHERE job_id = $1 AND offer->>'error' = 'TIMEOUT'",
        )
        .bind(job_id)
        .fetch_all(self.pool)
        .await?;
        let timed_out_sources: Vec<Id> = timed_out_sources.into_iter().map(|(s,)| s).collect();

        let aggregate_etag = format!(
            "{:x}",
            content_hash(job_id, last_seq, responses_received, job.expected_sources, timed_out_sources.len())
        );

        Ok(JobSince {
            status: job.status,
            new_items,
            last_seq,
            responses_received,
            total_expected: job.expected_sources,
            timed_out_sources,
            aggregate_etag,
        })
    }

    /// Deletes jobs (and their results) older than `ttl`, spec.md §4.5.
    pub async fn purge_expired(&self, ttl: Duration) -> CoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let stale: Vec<(Id,)> = sqlx::query_as(
            "SELECT id FROM availability_jobs WHERE created_at < now() - make_interval(secs => $1)",
        )
        .bind(ttl.as_secs_f64())
        .fetch_all(&mut *tx)
        .await?;

        for (id,) in &stale {
            sqlx::query("DELETE FROM availability_results WHERE job_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM availability_jobs WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(stale.len() as u64)
    }
}

/// A deterministic, dependency-free fingerprint for `aggregate_etag`
/// (spec.md §4.5: "a deterministic hash of ..."). Not a cryptographic hash —
/// just stable content-addressing for cache-friendly polling.
fn content_hash(job_id: Id, last_seq: i64, responses: i64, expected: i32, timed_out: usize) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    job_id.hash(&mut hasher);
    last_seq.hash(&mut hasher);
    responses.hash(&mut hasher);
    expected.hash(&mut hasher);
    timed_out.hash(&mut hasher);
    hasher.finish()
}
