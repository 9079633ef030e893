//! Create -> Modify -> Cancel against a real Postgres pool and a `Mock`
//! source (spec.md §8 scenario S4 "full booking lifecycle").
use std::sync::Arc;

use common::{CompanyType, Id};
use dal::{AgreementStore, BookingStore, CompanyStore, HealthStore};
use metrics::TracingSink;
use models::{AgreementStatus, BookingStatus, CompanyStatus};
use rezcore::{BookingCore, CreateBookingRequest, ModifyBookingRequest};

async fn migrated_pool() -> sqlx::PgPool {
    let pool = testing_utils::test_pool();
    dal::run_migrations(&pool).await.expect("migrations must apply cleanly");
    pool
}

fn booking_core(pool: &sqlx::PgPool) -> BookingCore<'_> {
    BookingCore::new(
        BookingStore::new(pool),
        AgreementStore::new(pool),
        CompanyStore::new(pool),
        HealthStore::new(pool),
        config::HealthConfig::default(),
        Arc::new(adapters::AdapterRegistry::new()),
        Arc::new(TracingSink),
    )
}

#[tokio::test]
async fn create_modify_cancel_round_trip() {
    let pool = migrated_pool().await;

    let source = testing_utils::seed_company(&pool, CompanyType::Source, CompanyStatus::Active).await;
    sqlx::query("UPDATE companies SET transport = 'mock', address = $2 WHERE id = $1")
        .bind(source.id)
        .bind("USLAX")
        .execute(&pool)
        .await
        .unwrap();

    let agent_id = Id::new();
    let agreement = testing_utils::seed_agreement(&pool, agent_id, source.id, "AGR-LIFECYCLE", AgreementStatus::Active).await;

    let core = booking_core(&pool);

    let created = core
        .create(CreateBookingRequest {
            agent_id,
            source_id: source.id,
            agreement_ref: agreement.agreement_ref.clone(),
            supplier_offer_ref: None,
            idempotency_key: "idem-1".to_string(),
            agent_booking_ref: Some("AGENT-REF-1".to_string()),
            pickup_unlocode: "USLAX".to_string(),
            dropoff_unlocode: "USLAX".to_string(),
            pickup_iso: chrono::Utc::now(),
            dropoff_iso: chrono::Utc::now(),
            vehicle_class: "ECONOMY".to_string(),
            driver_age: 25,
            residency_country: "US".to_string(),
            customer_info: None,
            payment_info: None,
        })
        .await
        .expect("create must succeed");

    assert_eq!(created.status, BookingStatus::Confirmed);
    let supplier_booking_ref = created.supplier_booking_ref.clone().expect("mock adapter always returns a ref");

    // Idempotent replay: same idempotency_key returns the same booking, no duplicate insert.
    let replay = core
        .create(CreateBookingRequest {
            agent_id,
            source_id: source.id,
            agreement_ref: agreement.agreement_ref.clone(),
            supplier_offer_ref: None,
            idempotency_key: "idem-1".to_string(),
            agent_booking_ref: Some("AGENT-REF-1".to_string()),
            pickup_unlocode: "USLAX".to_string(),
            dropoff_unlocode: "USLAX".to_string(),
            pickup_iso: chrono::Utc::now(),
            dropoff_iso: chrono::Utc::now(),
            vehicle_class: "ECONOMY".to_string(),
            driver_age: 25,
            residency_country: "US".to_string(),
            customer_info: None,
            payment_info: None,
        })
        .await
        .expect("idempotent replay must succeed");
    assert_eq!(replay.id, created.id);

    let modified = core
        .modify(
            source.id,
            &supplier_booking_ref,
            ModifyBookingRequest {
                agreement_ref: Some(agreement.agreement_ref.clone()),
                vehicle_class: Some("SUV".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("modify must succeed");
    assert_eq!(modified.vehicle_class, "SUV");

    // A mismatched agreement_ref override is rejected before the adapter is ever called.
    let mismatch = core
        .modify(
            source.id,
            &supplier_booking_ref,
            ModifyBookingRequest {
                agreement_ref: Some("WRONG-AGR".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(mismatch.is_err());

    let checked = core
        .check(source.id, &supplier_booking_ref, None)
        .await
        .expect("check must succeed");
    assert_eq!(checked.status, BookingStatus::Confirmed);

    let cancelled = core
        .cancel(source.id, &supplier_booking_ref, Some(agreement.agreement_ref.as_str()))
        .await
        .expect("cancel must succeed");
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let history = core.history(created.id).await.expect("history must be readable");
    assert!(history.len() >= 3, "expected at least created/modified/cancelled events, got {}", history.len());
}
