use chrono::{DateTime, Utc};
use common::Id;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Agreement status lifecycle, spec.md §3:
///
/// ```text
/// DRAFT → OFFERED → ACCEPTED → ACTIVE ⇄ SUSPENDED
///                                  ↘       ↘
///                                   EXPIRED (terminal)
/// OFFERED → EXPIRED (on timeout)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, strum_macros::Display, JsonSchema,
)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementStatus {
    Draft,
    Offered,
    Accepted,
    Active,
    Suspended,
    Expired,
}

impl AgreementStatus {
    /// Whether `self -> next` is a permitted edge of the state graph above.
    pub fn can_transition_to(self, next: AgreementStatus) -> bool {
        use AgreementStatus::*;
        matches!(
            (self, next),
            (Draft, Offered)
                | (Offered, Accepted)
                | (Offered, Expired)
                | (Accepted, Active)
                | (Active, Suspended)
                | (Active, Expired)
                | (Suspended, Active)
                | (Suspended, Expired)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AgreementStatus::Expired)
    }
}

/// `Agreement` of spec.md §3. Unique by `(sourceId, agreementRef)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, JsonSchema)]
pub struct Agreement {
    pub id: Id,
    pub agent_id: Id,
    pub source_id: Id,
    pub agreement_ref: String,
    pub status: AgreementStatus,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub offered_at: Option<DateTime<Utc>>,
}

impl Agreement {
    pub fn is_active(&self) -> bool {
        self.status == AgreementStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::AgreementStatus::*;

    #[test]
    fn permitted_edges_hold() {
        assert!(Draft.can_transition_to(Offered));
        assert!(Offered.can_transition_to(Accepted));
        assert!(Offered.can_transition_to(Expired));
        assert!(Accepted.can_transition_to(Active));
        assert!(Active.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Active));
        assert!(Active.can_transition_to(Expired));
        assert!(Suspended.can_transition_to(Expired));
    }

    #[test]
    fn illegal_edges_rejected() {
        assert!(!Draft.can_transition_to(Active));
        assert!(!Expired.can_transition_to(Active));
        assert!(!Accepted.can_transition_to(Suspended));
        assert!(!Draft.can_transition_to(Expired));
    }

    #[test]
    fn expired_is_terminal() {
        assert!(Expired.is_terminal());
        assert!(!Active.is_terminal());
    }
}
