use chrono::Utc;
use common::{CoreError, CoreResult, Id};
use models::{Agreement, AgreementStatus};
use sqlx::PgPool;

pub struct AgreementStore<'a> {
    pool: &'a PgPool,
}

const COLUMNS: &str =
    "id, agent_id, source_id, agreement_ref, status, valid_from, valid_to, offered_at";

impl<'a> AgreementStore<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_draft(&self, agent_id: Id, source_id: Id, agreement_ref: &str) -> CoreResult<Agreement> {
        let existing = self.get_by_source_ref(source_id, agreement_ref).await?;
        if existing.is_some() {
            return Err(CoreError::AlreadyExists(format!(
                "agreement {agreement_ref} already exists for source {source_id}"
            )));
        }

        let agreement = Agreement {
            id: Id::new(),
            agent_id,
            source_id,
            agreement_ref: agreement_ref.to_string(),
            status: AgreementStatus::Draft,
            valid_from: None,
            valid_to: None,
            offered_at: None,
        };

        sqlx::query(
            "INSERT INTO agreements (id, agent_id, source_id, agreement_ref, status, valid_from, valid_to, offered_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(agreement.id)
        .bind(agreement.agent_id)
        .bind(agreement.source_id)
        .bind(&agreement.agreement_ref)
        .bind(agreement.status.to_string())
        .bind(agreement.valid_from)
        .bind(agreement.valid_to)
        .bind(agreement.offered_at)
        .execute(self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CoreError::AlreadyExists(format!("agreement {agreement_ref} already exists"))
            }
            _ => e.into(),
        })?;

        Ok(agreement)
    }

    pub async fn get(&self, id: Id) -> CoreResult<Option<Agreement>> {
        let row = sqlx::query_as::<_, Agreement>(&format!("SELECT {COLUMNS} FROM agreements WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_by_source_ref(&self, source_id: Id, agreement_ref: &str) -> CoreResult<Option<Agreement>> {
        let row = sqlx::query_as::<_, Agreement>(&format!(
            "SELECT {COLUMNS} FROM agreements WHERE source_id = $1 AND agreement_ref = $2"
        ))
        .bind(source_id)
        .bind(agreement_ref)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Looks up the ACTIVE agreement for `(agent_id, source_id, agreement_ref)`,
    /// the gate every booking operation re-checks (spec.md §4.7).
    pub async fn get_active(&self, agent_id: Id, source_id: Id, agreement_ref: &str) -> CoreResult<Option<Agreement>> {
        let row = sqlx::query_as::<_, Agreement>(&format!(
            "SELECT {COLUMNS} FROM agreements
             WHERE agent_id = $1 AND source_id = $2 AND agreement_ref = $3 AND status = 'ACTIVE'"
        ))
        .bind(agent_id)
        .bind(source_id)
        .bind(agreement_ref)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_active_for_agent(&self, agent_id: Id, refs: &[String]) -> CoreResult<Vec<Agreement>> {
        let rows = if refs.is_empty() {
            sqlx::query_as::<_, Agreement>(&format!(
                "SELECT {COLUMNS} FROM agreements WHERE agent_id = $1 AND status = 'ACTIVE'"
            ))
            .bind(agent_id)
            .fetch_all(self.pool)
            .await?
        } else {
            sqlx::query_as::<_, Agreement>(&format!(
                "SELECT {COLUMNS} FROM agreements
                 WHERE agent_id = $1 AND status = 'ACTIVE' AND agreement_ref = ANY($2)"
            ))
            .bind(agent_id)
            .bind(refs)
            .fetch_all(self.pool)
            .await?
        };
        Ok(rows)
    }

    pub async fn list_by_agent(&self, agent_id: Id, status: Option<AgreementStatus>) -> CoreResult<Vec<Agreement>> {
        let rows = match status {
            Some(s) => {
                sqlx::query_as::<_, Agreement>(&format!(
                    "SELECT {COLUMNS} FROM agreements WHERE agent_id = $1 AND status = $2"
                ))
                .bind(agent_id)
                .bind(s.to_string())
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Agreement>(&format!("SELECT {COLUMNS} FROM agreements WHERE agent_id = $1"))
                    .bind(agent_id)
                    .fetch_all(self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    pub async fn list_by_source(&self, source_id: Id, status: Option<AgreementStatus>) -> CoreResult<Vec<Agreement>> {
        let rows = match status {
            Some(s) => {
                sqlx::query_as::<_, Agreement>(&format!(
                    "SELECT {COLUMNS} FROM agreements WHERE source_id = $1 AND status = $2"
                ))
                .bind(source_id)
                .bind(s.to_string())
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Agreement>(&format!("SELECT {COLUMNS} FROM agreements WHERE source_id = $1"))
                    .bind(source_id)
                    .fetch_all(self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    /// Applies `id -> next` iff the current status permits the edge
    /// (spec.md §3 invariant iv), leaving state unchanged otherwise.
    pub async fn transition(&self, id: Id, next: AgreementStatus) -> CoreResult<Agreement> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Agreement>(&format!("SELECT {COLUMNS} FROM agreements WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("agreement {id}")))?;

        if !current.status.can_transition_to(next) {
            return Err(CoreError::precondition(
                "ILLEGAL_TRANSITION",
                format!("agreement {id} cannot move from {} to {next}", current.status),
            ));
        }

        let offered_at = if next == AgreementStatus::Offered {
            Some(Utc::now())
        } else {
            current.offered_at
        };

        sqlx::query("UPDATE agreements SET status = $2, offered_at = $3 WHERE id = $1")
            .bind(id)
            .bind(next.to_string())
            .bind(offered_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Agreement {
            status: next,
            offered_at,
            ..current
        })
    }

    /// Offers that have outlived `offer_ttl` transition to EXPIRED
    /// (spec.md §3 `OFFERED → EXPIRED (on timeout)`, SPEC_FULL.md §C.4).
    pub async fn expire_stale_offers(&self, offer_ttl_seconds: i64) -> CoreResult<Vec<Id>> {
        let rows: Vec<(Id,)> = sqlx::query_as(
            "UPDATE agreements SET status = 'EXPIRED'
             WHERE status = 'OFFERED' AND offered_at < now() - make_interval(secs => $1)
             RETURNING id",
        )
        .bind(offer_ttl_seconds as f64)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
