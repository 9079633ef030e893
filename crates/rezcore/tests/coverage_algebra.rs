//! Property tests for `CoverageResolver`'s override algebra (spec.md §4.3,
//! SPEC_FULL.md §D): an override always wins over base membership in
//! `allowed()`, and `effective()`'s listing-only inherited-dictionary
//! fallback never leaks into the `allowed()` point test.
use common::{CompanyType, Id};
use dal::CoverageStore;
use models::CompanyStatus;
use proptest::prelude::*;
use rezcore::CoverageResolver;
use testing_utils::{block_on_runtime, unlocode_strategy};

async fn migrated_pool() -> sqlx::PgPool {
    let pool = testing_utils::test_pool();
    dal::run_migrations(&pool).await.expect("migrations must apply cleanly");
    pool
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// A `deny` override always beats a declared base location: `allowed()`
    /// must be `false` regardless of what `source_locations` says.
    #[test]
    fn deny_override_always_wins(unlocode in unlocode_strategy()) {
        block_on_runtime! {
            let pool = migrated_pool().await;
            let source = testing_utils::seed_company(&pool, CompanyType::Source, CompanyStatus::Active).await;
            let agreement_id = Id::new();

            testing_utils::seed_unlocode(&pool, &unlocode, "US").await;
            testing_utils::seed_source_location(&pool, source.id, &unlocode).await;

            let coverage = CoverageStore::new(&pool);
            coverage.upsert_override(agreement_id, &unlocode, false).await.unwrap();

            let resolver = CoverageResolver::new(CoverageStore::new(&pool));
            let allowed = resolver.allowed(source.id, agreement_id, &unlocode).await.unwrap();
            prop_assert!(!allowed);
        }
    }

    /// An `allow` override grants access to a unlocode the source never
    /// declared as a base location.
    #[test]
    fn allow_override_grants_undeclared_location(unlocode in unlocode_strategy()) {
        block_on_runtime! {
            let pool = migrated_pool().await;
            let source = testing_utils::seed_company(&pool, CompanyType::Source, CompanyStatus::Active).await;
            let agreement_id = Id::new();

            testing_utils::seed_unlocode(&pool, &unlocode, "US").await;
            // deliberately no seed_source_location call

            let coverage = CoverageStore::new(&pool);
            coverage.upsert_override(agreement_id, &unlocode, true).await.unwrap();

            let resolver = CoverageResolver::new(CoverageStore::new(&pool));
            let allowed = resolver.allowed(source.id, agreement_id, &unlocode).await.unwrap();
            prop_assert!(allowed);
        }
    }

    /// Without any source locations or overrides, `effective()` falls back
    /// to the full dictionary (marked `inherited: true`), but `allowed()`
    /// never honors that fallback for an arbitrary dictionary unlocode.
    #[test]
    fn allowed_never_honors_the_inherited_fallback(unlocode in unlocode_strategy()) {
        block_on_runtime! {
            let pool = migrated_pool().await;
            let source = testing_utils::seed_company(&pool, CompanyType::Source, CompanyStatus::Active).await;
            let agreement_id = Id::new();

            testing_utils::seed_unlocode(&pool, &unlocode, "US").await;

            let resolver = CoverageResolver::new(CoverageStore::new(&pool));

            let effective = resolver.effective(source.id, agreement_id).await.unwrap();
            prop_assert!(effective.iter().any(|item| item.unlocode == unlocode && item.inherited));

            let allowed = resolver.allowed(source.id, agreement_id, &unlocode).await.unwrap();
            prop_assert!(!allowed);
        }
    }
}
