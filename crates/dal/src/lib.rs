//! Persistence layer: a Postgres pool plus one store per aggregate of
//! spec.md §3. Grounded on the teacher's `dal` crate (`get_db_pool`,
//! `sqlx::migrate!`), but built directly on `sqlx` rather than the teacher's
//! bespoke `FKey`/`EasyTransaction`/`DBTable` ORM layer — see `DESIGN.md`
//! "dal / Open decision".

pub mod agreement;
pub mod availability;
pub mod booking;
pub mod company;
pub mod coverage;
pub mod health;
pub mod pool;
pub mod seed;

pub use agreement::AgreementStore;
pub use availability::{AvailabilityStore, JobSince};
pub use booking::BookingStore;
pub use company::CompanyStore;
pub use coverage::{CoverageStore, SyncSummary};
pub use health::HealthStore;
pub use pool::{get_db_pool, initialize, run_migrations};
pub use seed::seed_unlocodes_from_csv;

use sqlx::PgPool;

/// A cheap bundle of every store, borrowed from one pool — what `rezcore`'s
/// operations take as their persistence dependency.
pub struct Stores<'a> {
    pub companies: CompanyStore<'a>,
    pub agreements: AgreementStore<'a>,
    pub coverage: CoverageStore<'a>,
    pub availability: AvailabilityStore<'a>,
    pub bookings: BookingStore<'a>,
    pub health: HealthStore<'a>,
}

impl<'a> Stores<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self {
            companies: CompanyStore::new(pool),
            agreements: AgreementStore::new(pool),
            coverage: CoverageStore::new(pool),
            availability: AvailabilityStore::new(pool),
            bookings: BookingStore::new(pool),
            health: HealthStore::new(pool),
        }
    }
}
