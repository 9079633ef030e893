use common::{CompanyType, Id, SourceEndpoint};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, strum_macros::Display)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyStatus {
    PendingVerification,
    Active,
    Suspended,
}

/// `Company` of spec.md §3. Immutable id; created at registration;
/// activated on email verification.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, JsonSchema)]
pub struct Company {
    pub id: Id,
    #[sqlx(try_from = "String")]
    pub company_type: CompanyTypeColumn,
    pub status: CompanyStatus,
    pub name: String,
    pub company_code: String,
    pub email_verified: bool,
    /// Only populated (and meaningful) for a SOURCE company.
    #[sqlx(skip)]
    pub endpoint: Option<SourceEndpoint>,
}

/// `sqlx::FromRow` needs a concrete column type; `common::CompanyType` lives
/// outside this crate so we bridge through a thin wrapper rather than
/// implementing foreign traits on a foreign type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CompanyTypeColumn(pub CompanyType);

impl TryFrom<String> for CompanyTypeColumn {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        use std::str::FromStr;
        Ok(Self(CompanyType::from_str(&value)?))
    }
}

impl From<CompanyType> for CompanyTypeColumn {
    fn from(t: CompanyType) -> Self {
        Self(t)
    }
}

impl Company {
    pub fn is_active(&self) -> bool {
        self.status == CompanyStatus::Active
    }
}
