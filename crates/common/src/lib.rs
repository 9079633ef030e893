//! Shared types and the error taxonomy used across every `rezcore` crate.
//!
//! Grounded on the teacher's `common` crate: a thin prelude other crates
//! import from rather than repeating `use` blocks of third-party crates.

pub mod error;
pub mod id;
pub mod transport;

pub use error::{CoreError, CoreResult};
pub use id::Id;
pub use transport::{SourceEndpoint, Transport};

/// The already-authenticated principal handed to every inbound operation.
/// Authentication/API-key verification itself is an external collaborator
/// (spec.md §1) and is never performed in this core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub company_id: Id,
    pub company_type: CompanyType,
    pub role: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, schemars::JsonSchema,
)]
pub enum CompanyType {
    Agent,
    Source,
    Admin,
}

pub mod prelude {
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::id::Id;
    pub use crate::transport::{SourceEndpoint, Transport};
    pub use crate::{CompanyType, Principal};

    pub use anyhow;
    pub use chrono;
    pub use serde::{Deserialize, Serialize};
    pub use tracing;
    pub use uuid;
}
