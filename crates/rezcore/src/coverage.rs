//! `CoverageResolver`, spec.md §4.3.
//!
//! `Effective(agreementId) = (SourceLocations(sourceOf(agreementId)) ∪
//! {u | override(u)=allow}) \ {u | override(u)=deny}`, with a point test
//! `Allowed` where an override always wins over base membership.
use std::collections::HashSet;

use common::{CoreResult, Id};
use dal::CoverageStore;
use models::CoverageItem;

pub struct CoverageResolver<'a> {
    store: CoverageStore<'a>,
}

impl<'a> CoverageResolver<'a> {
    pub fn new(store: CoverageStore<'a>) -> Self {
        Self { store }
    }

    /// Full effective coverage listing for an agreement. Per SPEC_FULL.md
    /// §D (resolving spec.md §9's Open Question as intent (i)): if the
    /// source has no declared locations and the agreement has no allow
    /// overrides, this falls back to the full UN/LOCODE dictionary and
    /// marks every returned item `inherited: true` — but that fallback is
    /// listing-only; `allowed()` below never honors it.
    pub async fn effective(&self, agreement_source_id: Id, agreement_id: Id) -> CoreResult<Vec<CoverageItem>> {
        let base: HashSet<String> = self
            .store
            .source_locations_for(agreement_source_id)
            .await?
            .into_iter()
            .map(|l| l.unlocode)
            .collect();

        let overrides = self.store.list_overrides(agreement_id).await?;
        let allow: HashSet<String> = overrides.iter().filter(|o| o.allowed).map(|o| o.unlocode.clone()).collect();
        let deny: HashSet<String> = overrides.iter().filter(|o| !o.allowed).map(|o| o.unlocode.clone()).collect();

        if base.is_empty() && allow.is_empty() {
            let dictionary = self.store.list_unlocodes().await?;
            return Ok(dictionary
                .into_iter()
                .filter(|u| !deny.contains(&u.unlocode))
                .map(|u| CoverageItem {
                    unlocode: u.unlocode,
                    inherited: true,
                })
                .collect());
        }

        let mut effective: HashSet<String> = base.union(&allow).cloned().collect();
        for code in &deny {
            effective.remove(code);
        }

        Ok(effective
            .into_iter()
            .map(|unlocode| CoverageItem { unlocode, inherited: false })
            .collect())
    }

    /// Point test used by the fan-out gate: an override always dictates;
    /// otherwise membership in the source's declared locations. Never
    /// honors the inherited-dictionary fallback, so an unconfigured source
    /// is never fanned out to (spec.md §4.3, SPEC_FULL.md §D).
    pub async fn allowed(&self, agreement_source_id: Id, agreement_id: Id, unlocode: &str) -> CoreResult<bool> {
        if let Some(allowed) = self.store.get_override(agreement_id, unlocode).await? {
            return Ok(allowed);
        }
        let base = self.store.list_source_locations(agreement_source_id).await?;
        Ok(base.iter().any(|u| u == unlocode))
    }
}
