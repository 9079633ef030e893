use common::{CoreResult, Id};
use models::{AgreementLocationOverride, SourceLocation, UnLocode};
use sqlx::PgPool;

pub struct CoverageStore<'a> {
    pool: &'a PgPool,
}

/// Summary of a `SyncSourceCoverage` admin run (SPEC_FULL.md §C.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl<'a> CoverageStore<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_source_locations(&self, source_id: Id) -> CoreResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT unlocode FROM source_locations WHERE source_id = $1")
                .bind(source_id)
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    /// Pulls `adapter.locations()`, intersects with the known `UNLocode`
    /// dictionary, inserts new rows and removes stale ones, all in one
    /// transaction (spec.md §3, SPEC_FULL.md §C.1).
    pub async fn sync_source_coverage(
        &self,
        source_id: Id,
        reported: &[String],
    ) -> CoreResult<SyncSummary> {
        let known: Vec<(String,)> = sqlx::query_as("SELECT unlocode FROM unlocodes WHERE unlocode = ANY($1)")
            .bind(reported)
            .fetch_all(self.pool)
            .await?;
        let valid: std::collections::HashSet<String> = known.into_iter().map(|(u,)| u).collect();

        let existing: std::collections::HashSet<String> =
            self.list_source_locations(source_id).await?.into_iter().collect();

        let mut tx = self.pool.begin().await?;
        let mut summary = SyncSummary::default();

        for code in &valid {
            if existing.contains(code) {
                summary.unchanged += 1;
            } else {
                sqlx::query("INSERT INTO source_locations (source_id, unlocode) VALUES ($1, $2)")
                    .bind(source_id)
                    .bind(code)
                    .execute(&mut *tx)
                    .await?;
                summary.added += 1;
            }
        }

        for code in existing.difference(&valid) {
            sqlx::query("DELETE FROM source_locations WHERE source_id = $1 AND unlocode = $2")
                .bind(source_id)
                .bind(code)
                .execute(&mut *tx)
                .await?;
            summary.removed += 1;
        }

        tx.commit().await?;
        Ok(summary)
    }

    pub async fn list_overrides(&self, agreement_id: Id) -> CoreResult<Vec<AgreementLocationOverride>> {
        let rows = sqlx::query_as::<_, AgreementLocationOverride>(
            "SELECT agreement_id, unlocode, allowed FROM agreement_location_overrides WHERE agreement_id = $1",
        )
        .bind(agreement_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_override(&self, agreement_id: Id, unlocode: &str) -> CoreResult<Option<bool>> {
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT allowed FROM agreement_location_overrides WHERE agreement_id = $1 AND unlocode = $2",
        )
        .bind(agreement_id)
        .bind(unlocode)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(a,)| a))
    }

    pub async fn upsert_override(&self, agreement_id: Id, unlocode: &str, allowed: bool) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO agreement_location_overrides (agreement_id, unlocode, allowed)
             VALUES ($1, $2, $3)
             ON CONFLICT (agreement_id, unlocode) DO UPDATE SET allowed = excluded.allowed",
        )
        .bind(agreement_id)
        .bind(unlocode)
        .bind(allowed)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_override(&self, agreement_id: Id, unlocode: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM agreement_location_overrides WHERE agreement_id = $1 AND unlocode = $2")
            .bind(agreement_id)
            .bind(unlocode)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_unlocodes(&self) -> CoreResult<Vec<UnLocode>> {
        let rows = sqlx::query_as::<_, UnLocode>(
            "SELECT unlocode, country, place, iata_code, lat, lon FROM unlocodes",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn unlocode_exists(&self, unlocode: &str) -> CoreResult<bool> {
        let row: Option<(String,)> = sqlx::query_as("SELECT unlocode FROM unlocodes WHERE unlocode = $1")
            .bind(unlocode)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn source_locations_for(&self, source_id: Id) -> CoreResult<Vec<SourceLocation>> {
        let rows = sqlx::query_as::<_, SourceLocation>(
            "SELECT source_id, unlocode FROM source_locations WHERE source_id = $1",
        )
        .bind(source_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
