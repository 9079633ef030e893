//! `BookingStore`'s idempotency-key lookup (spec.md invariant v, §4.7.1
//! step 3): a booking and its key always commit together, and a repeated
//! key resolves back to the same booking.
use chrono::Utc;
use common::Id;
use dal::BookingStore;
use models::{Booking, BookingStatus};
use serde_json::Value;

async fn migrated_pool() -> sqlx::PgPool {
    let pool = testing_utils::test_pool();
    dal::run_migrations(&pool).await.expect("migrations must apply cleanly");
    pool
}

fn sample_booking(agent_id: Id, source_id: Id) -> Booking {
    Booking {
        id: Id::new(),
        agent_id,
        source_id,
        agreement_ref: "AGR-1".to_string(),
        supplier_booking_ref: Some("SUP-1".to_string()),
        agent_booking_ref: None,
        idempotency_key: Some("idem-key".to_string()),
        status: BookingStatus::Confirmed,
        pickup_unlocode: "USLAX".to_string(),
        dropoff_unlocode: "USLAX".to_string(),
        pickup_iso: Utc::now(),
        dropoff_iso: Utc::now(),
        vehicle_class: "ECONOMY".to_string(),
        make_model: None,
        rate_plan: None,
        driver_age: 30,
        residency_country: "US".to_string(),
        customer_info: None,
        payment_info: None,
        payload_snapshot: Value::Null,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn find_idempotent_resolves_to_the_committed_booking() {
    let pool = migrated_pool().await;
    let store = BookingStore::new(&pool);
    let agent_id = Id::new();
    let source_id = Id::new();

    let before = store.find_idempotent(agent_id, "booking:create", "idem-key").await.unwrap();
    assert!(before.is_none());

    let booking = sample_booking(agent_id, source_id);
    store.insert_with_idempotency_key(&booking, "booking:create", "idem-key").await.unwrap();

    let replay = store
        .find_idempotent(agent_id, "booking:create", "idem-key")
        .await
        .unwrap()
        .expect("key must resolve after insert");
    assert_eq!(replay.id, booking.id);

    // A different agent using the same literal key is a different scope row.
    let other_agent = store.find_idempotent(Id::new(), "booking:create", "idem-key").await.unwrap();
    assert!(other_agent.is_none());
}

#[tokio::test]
async fn apply_update_preserves_fields_not_supplied() {
    let pool = migrated_pool().await;
    let store = BookingStore::new(&pool);
    let booking = sample_booking(Id::new(), Id::new());
    store.insert_with_idempotency_key(&booking, "booking:create", "idem-key-2").await.unwrap();

    let updated = store
        .apply_update(
            booking.id,
            BookingStatus::Cancelled,
            None,
            None,
            None,
            None,
            None,
            None,
            serde_json::json!({"ack": "CANCELLED"}),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, BookingStatus::Cancelled);
    assert_eq!(updated.pickup_unlocode, booking.pickup_unlocode, "unsupplied fields must carry over unchanged");
    assert_eq!(updated.supplier_booking_ref, booking.supplier_booking_ref);
}
