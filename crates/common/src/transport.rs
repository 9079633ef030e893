use serde::{Deserialize, Serialize};

/// The transport kind a SOURCE company's adapter speaks, spec.md §3/§4.1.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    strum_macros::Display,
    schemars::JsonSchema,
)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    Mock,
    Grpc,
    Http,
}

/// Endpoint configuration carried by a SOURCE company, consumed by
/// `adapters::AdapterRegistry` to materialize a `SourceAdapter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SourceEndpoint {
    pub transport: Transport,
    pub address: String,
    pub auth: Option<String>,
}
