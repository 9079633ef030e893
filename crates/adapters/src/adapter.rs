use async_trait::async_trait;

use crate::error::AdapterError;
use crate::types::{AdapterOffer, AvailabilityRequest, BookingAck, BookingPayload};

/// Uniform per-source driver, one implementation per transport kind
/// (spec.md §4.1). The core never sees transport detail beyond this trait;
/// adapter failures are always one of the three `AdapterError` variants.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// UN/LOCODEs the source claims to serve.
    async fn locations(&self) -> Result<Vec<String>, AdapterError>;

    /// Zero or more offers for the given criteria. Offers missing a
    /// `supplier_offer_ref` are filled in by the adapter deterministically
    /// from the request and offer fields (spec.md §4.1).
    async fn availability(&self, request: &AvailabilityRequest) -> Result<Vec<AdapterOffer>, AdapterError>;

    async fn booking_create(&self, payload: &BookingPayload) -> Result<BookingAck, AdapterError>;

    async fn booking_modify(&self, payload: &BookingPayload) -> Result<BookingAck, AdapterError>;

    async fn booking_cancel(&self, supplier_booking_ref: &str, agreement_ref: &str) -> Result<BookingAck, AdapterError>;

    async fn booking_check(&self, supplier_booking_ref: &str, agreement_ref: &str) -> Result<BookingAck, AdapterError>;
}
