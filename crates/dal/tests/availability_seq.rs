//! Property/concurrency coverage for `AvailabilityStore`, spec.md §4.5/§5
//! "append order equals seq order, no two concurrent appends collide".
use std::sync::Arc;

use common::Id;
use dal::AvailabilityStore;
use models::{OfferOrMarker, ResultMarker};

async fn migrated_pool() -> sqlx::PgPool {
    let pool = testing_utils::test_pool();
    dal::run_migrations(&pool).await.expect("migrations must apply cleanly");
    pool
}

#[tokio::test]
async fn concurrent_appends_allocate_disjoint_strictly_increasing_seqs() {
    let pool = Arc::new(migrated_pool().await);
    let agent_id = Id::new();

    let job_id = AvailabilityStore::new(&pool)
        .create_job(agent_id, serde_json::json!({}), 8)
        .await
        .expect("create_job must succeed");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let marker = OfferOrMarker::Marker {
                error: ResultMarker::NoResult,
                message: None,
            };
            AvailabilityStore::new(&pool)
                .append_partial(job_id, Id::new(), vec![marker], false)
                .await
                .expect("append_partial must succeed")
        }));
    }

    let mut all_seqs: Vec<i64> = Vec::new();
    for handle in handles {
        all_seqs.extend(handle.await.expect("worker must not panic"));
    }

    all_seqs.sort_unstable();
    let mut unique = all_seqs.clone();
    unique.dedup();
    assert_eq!(all_seqs.len(), unique.len(), "no two concurrent appends should allocate the same seq");

    for pair in all_seqs.windows(2) {
        assert!(pair[1] > pair[0], "seqs must be strictly increasing once sorted");
    }

    let since = AvailabilityStore::new(&pool)
        .get_since(job_id, 0, 0)
        .await
        .expect("get_since must succeed");
    assert_eq!(since.new_items.len(), 8);
    let mut returned: Vec<i64> = since.new_items.iter().map(|r| r.seq).collect();
    returned.sort_unstable();
    assert_eq!(returned, all_seqs, "read order must match allocation order");
}
