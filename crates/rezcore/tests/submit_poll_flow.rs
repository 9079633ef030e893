//! Submit -> (background fan-out) -> GetJobSince, exercised end to end
//! against a real Postgres pool (spec.md §8 scenario S1 "happy path single
//! source"). Requires `DATABASE_URL` pointing at a migrated database; see
//! `testing_utils::test_pool`.
use std::sync::Arc;

use common::{CompanyType, Id};
use dal::{AgreementStore, AvailabilityStore};
use metrics::TracingSink;
use models::{AgreementStatus, CompanyStatus, JobStatus};
use rezcore::FanOutEngine;

async fn migrated_pool() -> sqlx::PgPool {
    let pool = testing_utils::test_pool();
    dal::run_migrations(&pool).await.expect("migrations must apply cleanly");
    pool
}

#[tokio::test]
async fn submit_dispatches_to_single_mock_source_and_completes() {
    let pool = migrated_pool().await;

    let source = testing_utils::seed_company(&pool, CompanyType::Source, CompanyStatus::Active).await;
    sqlx::query("UPDATE companies SET transport = 'mock', address = $2 WHERE id = $1")
        .bind(source.id)
        .bind("USLAX")
        .execute(&pool)
        .await
        .unwrap();

    testing_utils::seed_unlocode(&pool, "USLAX", "US").await;
    testing_utils::seed_source_location(&pool, source.id, "USLAX").await;

    let agent_id = Id::new();
    let agreement = testing_utils::seed_agreement(&pool, agent_id, source.id, "AGR-1", AgreementStatus::Active).await;

    let engine = FanOutEngine::new(
        pool.clone(),
        Arc::new(adapters::AdapterRegistry::new()),
        Arc::new(TracingSink),
        config::FanoutConfig {
            timeout_ms: 5_000,
            sla_ms: 60_000,
            concurrency: 4,
        },
        config::HealthConfig::default(),
    );

    let criteria = serde_json::json!({
        "pickupUnlocode": "USLAX",
        "dropoffUnlocode": "USLAX",
        "pickupIso": "2026-08-01T10:00:00Z",
        "dropoffIso": "2026-08-03T10:00:00Z",
        "agreementRefs": agreement.agreement_ref,
    });

    let result = engine.submit(agent_id, criteria).await.expect("submit must succeed");
    assert_eq!(result.expected_sources, 1);

    let availability = AvailabilityStore::new(&pool);
    let mut since = availability
        .get_since(result.request_id, 0, 2_000)
        .await
        .expect("get_since must succeed");

    let mut attempts = 0;
    while since.status != JobStatus::Complete && attempts < 10 {
        since = availability
            .get_since(result.request_id, since.last_seq, 500)
            .await
            .expect("get_since must succeed");
        attempts += 1;
    }

    assert_eq!(since.status, JobStatus::Complete, "job should complete once the one eligible source replies");
    assert!(!since.new_items.is_empty(), "the mock source covers USLAX and should return offers");

    // sanity: the agreement we resolved against is still ACTIVE
    let reloaded = AgreementStore::new(&pool).get(agreement.id).await.unwrap().unwrap();
    assert!(reloaded.is_active());
}

#[tokio::test]
async fn submit_with_no_eligible_agreements_completes_immediately() {
    let pool = migrated_pool().await;
    let agent_id = Id::new();

    let engine = FanOutEngine::new(
        pool.clone(),
        Arc::new(adapters::AdapterRegistry::new()),
        Arc::new(TracingSink),
        config::FanoutConfig::default(),
        config::HealthConfig::default(),
    );

    let criteria = serde_json::json!({
        "pickupUnlocode": "USLAX",
        "dropoffUnlocode": "USLAX",
        "pickupIso": "2026-08-01T10:00:00Z",
        "dropoffIso": "2026-08-03T10:00:00Z",
    });

    let result = engine.submit(agent_id, criteria).await.expect("submit must succeed");
    assert_eq!(result.expected_sources, 0);

    let job = AvailabilityStore::new(&pool)
        .get_job(result.request_id)
        .await
        .unwrap()
        .expect("job row must exist");
    assert_eq!(job.status, JobStatus::Complete);
}
