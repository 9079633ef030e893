//! The data model of spec.md §3: entities persisted by `dal` and passed
//! between `rezcore`'s subsystems. Grounded on the teacher's `models` crate
//! shape — plain structs deriving `Serialize`/`Deserialize`/`sqlx::FromRow`,
//! with enums via `strum`.

pub mod agreement;
pub mod availability;
pub mod booking;
pub mod company;
pub mod coverage;
pub mod health;

pub use agreement::{Agreement, AgreementStatus};
pub use availability::{
    AvailabilityJob, AvailabilityResult, JobStatus, OfferOrMarker, ResultMarker, VehicleOffer,
};
pub use booking::{
    Booking, BookingHistoryEvent, BookingStatus, EventType, HistoryActor, IdempotencyKey,
};
pub use company::{Company, CompanyStatus};
pub use coverage::{AgreementLocationOverride, SourceLocation, UnLocode};
pub use health::SourceHealth;
