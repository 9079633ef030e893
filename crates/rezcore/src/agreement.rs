//! `AgreementManager`, spec.md §4.8.
use common::{CompanyType, CoreError, CoreResult, Id};
use dal::{AgreementStore, CompanyStore};
use models::{Agreement, AgreementStatus, Company};

pub struct AgreementManager<'a> {
    agreements: AgreementStore<'a>,
    companies: CompanyStore<'a>,
}

impl<'a> AgreementManager<'a> {
    pub fn new(agreements: AgreementStore<'a>, companies: CompanyStore<'a>) -> Self {
        Self { agreements, companies }
    }

    /// `CreateDraft` — validates `agent.type=AGENT ∧ source.type=SOURCE ∧
    /// both.status=ACTIVE` before inserting (spec.md §4.8). Unique
    /// violations on `(sourceId, agreementRef)` surface as `ALREADY_EXISTS`
    /// (handled inside `AgreementStore::create_draft`).
    pub async fn create_draft(&self, agent_id: Id, source_id: Id, agreement_ref: &str) -> CoreResult<Agreement> {
        let agent = self.require_company(agent_id, CompanyType::Agent).await?;
        let source = self.require_company(source_id, CompanyType::Source).await?;

        if !agent.is_active() || !source.is_active() {
            return Err(CoreError::precondition(
                "COMPANY_INACTIVE",
                format!("agent {agent_id} or source {source_id} is not ACTIVE"),
            ));
        }

        self.agreements.create_draft(agent_id, source_id, agreement_ref).await
    }

    async fn require_company(&self, id: Id, expected: CompanyType) -> CoreResult<Company> {
        let company = self
            .companies
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("company {id}")))?;
        if company.company_type.0 != expected {
            return Err(CoreError::PermissionDenied(format!("company {id} is not a {expected}")));
        }
        Ok(company)
    }

    pub async fn offer(&self, agreement_id: Id) -> CoreResult<Agreement> {
        self.agreements.transition(agreement_id, AgreementStatus::Offered).await
    }

    pub async fn accept(&self, agreement_id: Id) -> CoreResult<Agreement> {
        self.agreements.transition(agreement_id, AgreementStatus::Accepted).await
    }

    /// `SetStatus(ACTIVE|SUSPENDED|EXPIRED)` — spec.md §4.8. Any other
    /// target is rejected up front rather than left to the store's
    /// graph check, since this entry point only exposes those three.
    pub async fn set_status(&self, agreement_id: Id, status: AgreementStatus) -> CoreResult<Agreement> {
        if !matches!(status, AgreementStatus::Active | AgreementStatus::Suspended | AgreementStatus::Expired) {
            return Err(CoreError::InvalidArgument(format!(
                "set_status only accepts ACTIVE, SUSPENDED, or EXPIRED, got {status}"
            )));
        }
        self.agreements.transition(agreement_id, status).await
    }

    pub async fn list_by_agent(&self, agent_id: Id, status: Option<AgreementStatus>) -> CoreResult<Vec<Agreement>> {
        self.agreements.list_by_agent(agent_id, status).await
    }

    pub async fn list_by_source(&self, source_id: Id, status: Option<AgreementStatus>) -> CoreResult<Vec<Agreement>> {
        self.agreements.list_by_source(source_id, status).await
    }

    /// Offer expiry sweep (SPEC_FULL.md §C.4): agreements sitting in
    /// OFFERED past `offer_ttl_seconds` move to EXPIRED.
    pub async fn expire_stale_offers(&self, offer_ttl_seconds: i64) -> CoreResult<Vec<Id>> {
        self.agreements.expire_stale_offers(offer_ttl_seconds).await
    }
}
