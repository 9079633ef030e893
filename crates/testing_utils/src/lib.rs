//! Shared test scaffolding, grounded on the teacher's `testing_utils` crate:
//! a lazy real-Postgres pool, `proptest` generator strategies, and a
//! `block_on_runtime!` macro for property tests that can't use
//! `#[tokio::test]`. The teacher's `FKey`/`EasyTransaction`/`DBTable` helpers
//! have no counterpart here (`dal` is built directly on `sqlx`, see
//! `DESIGN.md` "dal / Open decision"); in their place this crate adds thin
//! fixture helpers over the real stores for the entities spec.md §3 names.
use chrono::{DateTime, Utc};
use common::{CompanyType, Id};
use dal::CompanyStore;
use models::{Agreement, AgreementStatus, Company, CompanyStatus};
use once_cell::sync::Lazy;
use prop::collection::vec;
use proptest::prelude::*;
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};

// `ctor` runs this before the test binary's own `main`, so every test gets
// readable panic output without each one installing it (tests run in
// parallel, so installing per-test would race).
#[ctor::ctor]
fn init() {
    color_eyre::install().ok();
}

static TEST_POOL: Lazy<PgPool> = Lazy::new(|| {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let max_connections = std::env::var("MAX_CONNECTIONS")
        .unwrap_or_else(|_| "10".to_string())
        .parse::<u32>()
        .expect("env var MAX_CONNECTIONS must be a number");

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_lazy(&url)
        .expect("Failed to create pool")
});

/// A cloned handle to the lazily-initialized integration-test pool.
/// Requires a migrated database reachable at `DATABASE_URL`.
pub fn test_pool() -> PgPool {
    TEST_POOL.clone()
}

/// Boilerplate-free escape hatch for running async code inside a `proptest!`
/// macro body, which doesn't support `#[tokio::test]`.
#[macro_export]
macro_rules! block_on_runtime {
    ($($block:tt)+) => {{
        let runtime = ::tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
        runtime.block_on(async { $($block)+ })
    }};
}

/// Inserts a bare-bones `ACTIVE` company of the given type and returns it.
pub async fn seed_company(pool: &PgPool, company_type: CompanyType, status: CompanyStatus) -> Company {
    let company = Company {
        id: Id::new(),
        company_type: company_type.into(),
        status,
        name: format!("Test Co {}", Id::new()),
        company_code: format!("CODE-{}", Id::new()),
        email_verified: true,
        endpoint: None,
    };
    CompanyStore::new(pool)
        .insert(&company)
        .await
        .expect("seed_company insert");
    company
}

/// Inserts an agreement directly at the given `status`, bypassing
/// `AgreementStore::create_draft`'s DRAFT-only entry point — fixtures
/// routinely need an already-`ACTIVE` agreement without replaying every
/// legal transition.
pub async fn seed_agreement(
    pool: &PgPool,
    agent_id: Id,
    source_id: Id,
    agreement_ref: &str,
    status: AgreementStatus,
) -> Agreement {
    let agreement = Agreement {
        id: Id::new(),
        agent_id,
        source_id,
        agreement_ref: agreement_ref.to_string(),
        status,
        valid_from: Some(Utc::now()),
        valid_to: None,
        offered_at: Some(Utc::now()),
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
    .execute(pool)
    .await
    .expect("seed_agreement insert");
    agreement
}

/// Inserts a single `unlocodes` dictionary row, for tests that need coverage
/// membership to resolve against a known-valid code.
pub async fn seed_unlocode(pool: &PgPool, unlocode: &str, country: &str) {
    sqlx::query(
        "INSERT INTO unlocodes (unlocode, country, place) VALUES ($1, $2, $3)
         ON CONFLICT (unlocode) DO NOTHING",
    )
    .bind(unlocode)
    .bind(country)
    .bind(unlocode)
    .execute(pool)
    .await
    .expect("seed_unlocode insert");
}

/// Marks `source_id` as covering `unlocode`.
pub async fn seed_source_location(pool: &PgPool, source_id: Id, unlocode: &str) {
    sqlx::query("INSERT INTO source_locations (source_id, unlocode) VALUES ($1, $2)")
        .bind(source_id)
        .bind(unlocode)
        .execute(pool)
        .await
        .expect("seed_source_location insert");
}

/// Generates a random [`DateTime<Utc>`] within a reasonable calendar range
/// (1970-01-01 to 2100-01-01), for pickup/dropoff instants.
pub fn datetime_utc_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..=4102444800i64).prop_map(|timestamp| DateTime::from_timestamp(timestamp, 0).unwrap())
}

/// Generates a plausible 5-character UN/LOCODE: two-letter country code
/// followed by a three-letter place code, matching spec.md §3's format.
pub fn unlocode_strategy() -> impl Strategy<Value = String> {
    ("[A-Z]{2}", "[A-Z]{3}").prop_map(|(country, place)| format!("{country}{place}"))
}

/// Generates one of the vehicle classes spec.md's examples use; a small
/// closed set rather than arbitrary strings, since vehicle class is an open
/// vocabulary agreed out-of-band with each source, not validated here.
pub fn vehicle_class_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ECONOMY".to_string()),
        Just("COMPACT".to_string()),
        Just("INTERMEDIATE".to_string()),
        Just("SUV".to_string()),
        Just("LUXURY".to_string()),
    ]
}

/// Generates a latency sample in milliseconds, spanning well past
/// `HealthConfig::slow_threshold_ms`'s usual range so property tests exercise
/// both the fast and slow branches of `HealthMonitor::record_metric`.
pub fn latency_ms_strategy() -> impl Strategy<Value = u64> {
    0u64..=30_000u64
}

/// Generates an opaque agreement/booking reference of the kind a source
/// assigns: short alphanumeric tokens, occasionally with a hyphen.
pub fn reference_strategy() -> impl Strategy<Value = String> {
    "[A-Z0-9]{4,12}(-[A-Z0-9]{2,6})?".prop_map(|s| s)
}

/// Generates an arbitrary [`serde_json::Value`], for round-tripping
/// `criteria`/`payload_snapshot`/`customer_info` style opaque JSON blobs
/// through `SubmitCriteria` deserialization and storage.
pub fn arb_json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[^\\x00-\\x1F\\\\]*".prop_map(Value::String)
    ];
    leaf.prop_recursive(3, 12, 5, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..5).prop_map(Value::Array),
            vec(("[a-z]{1,8}", inner), 0..5).prop_map(|pairs| {
                Value::Object(pairs.into_iter().collect::<Map<String, Value>>())
            }),
        ]
    })
}
