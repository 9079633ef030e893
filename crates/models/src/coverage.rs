use common::Id;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `UNLocode` dictionary row, spec.md §3. Read-only at runtime; loaded by a
/// seed step (`dal::seed_unlocodes`, SPEC_FULL.md §C.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, JsonSchema)]
pub struct UnLocode {
    pub unlocode: String,
    pub country: String,
    pub place: String,
    pub iata_code: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// `(sourceId, unlocode)` membership row — a source's declared coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SourceLocation {
    pub source_id: Id,
    pub unlocode: String,
}

/// `(agreementId, unlocode) -> allowed` override row. Precedence: an
/// override replaces base membership for that unlocode (spec.md §3/§4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AgreementLocationOverride {
    pub agreement_id: Id,
    pub unlocode: String,
    pub allowed: bool,
}

/// One row of a `ListCoverageByAgreement` response: a unlocode plus whether
/// it was reached via the listing-only inherited-default fallback
/// (SPEC_FULL.md §D).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageItem {
    pub unlocode: String,
    pub inherited: bool,
}
