use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::adapter::SourceAdapter;
use crate::error::AdapterError;
use crate::types::{AdapterOffer, AvailabilityRequest, BookingAck, BookingPayload};

/// A deterministic in-process adapter: given the same request, always
/// returns the same offers. Used by tests, the CLI, and any source whose
/// transport config names `Transport::Mock` (spec.md §4.1, Non-goal
/// "we do not implement real supplier transports").
pub struct MockAdapter {
    pub locations: Vec<String>,
    pub vehicle_classes: Vec<String>,
}

impl MockAdapter {
    pub fn new(locations: Vec<String>) -> Self {
        Self {
            locations,
            vehicle_classes: vec!["ECONOMY".into(), "SUV".into(), "LUXURY".into()],
        }
    }

    /// Deterministically synthesizes a `supplier_offer_ref` from the
    /// request and vehicle class, per spec.md §4.1's "must be
    /// deterministically synthesized ... from request+offer fields".
    fn synthesize_ref(request: &AvailabilityRequest, vehicle_class: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.pickup_unlocode.as_bytes());
        hasher.update(request.dropoff_unlocode.as_bytes());
        hasher.update(request.pickup_iso.to_rfc3339().as_bytes());
        hasher.update(request.dropoff_iso.to_rfc3339().as_bytes());
        hasher.update(vehicle_class.as_bytes());
        format!("mock-{:x}", hasher.finalize())[..24].to_string()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    async fn locations(&self) -> Result<Vec<String>, AdapterError> {
        Ok(self.locations.clone())
    }

    async fn availability(&self, request: &AvailabilityRequest) -> Result<Vec<AdapterOffer>, AdapterError> {
        if !self.locations.contains(&request.pickup_unlocode) {
            return Ok(vec![]);
        }

        let classes: Vec<&String> = if request.vehicle_classes.is_empty() {
            self.vehicle_classes.iter().collect()
        } else {
            self.vehicle_classes
                .iter()
                .filter(|c| request.vehicle_classes.contains(c))
                .collect()
        };

        Ok(classes
            .into_iter()
            .map(|class| AdapterOffer {
                supplier_offer_ref: Self::synthesize_ref(request, class),
                vehicle_class: class.clone(),
                make_model: Some(format!("Generic {class}")),
                currency: "USD".into(),
                total_price: base_price(class),
                availability_status: "AVAILABLE".into(),
            })
            .collect())
    }

    async fn booking_create(&self, payload: &BookingPayload) -> Result<BookingAck, AdapterError> {
        let ack_ref = payload
            .supplier_offer_ref
            .clone()
            .map(|r| format!("bkg-{r}"))
            .unwrap_or_else(|| format!("bkg-{}", uuid::Uuid::new_v4()));
        Ok(BookingAck {
            supplier_booking_ref: ack_ref,
            status: "CONFIRMED".into(),
        })
    }

    async fn booking_modify(&self, payload: &BookingPayload) -> Result<BookingAck, AdapterError> {
        let supplier_booking_ref = payload
            .supplier_booking_ref
            .clone()
            .ok_or_else(|| AdapterError::RemoteValidation("missing supplier_booking_ref".into()))?;
        Ok(BookingAck {
            supplier_booking_ref,
            status: "CONFIRMED".into(),
        })
    }

    async fn booking_cancel(&self, supplier_booking_ref: &str, _agreement_ref: &str) -> Result<BookingAck, AdapterError> {
        Ok(BookingAck {
            supplier_booking_ref: supplier_booking_ref.to_string(),
            status: "CANCELLED".into(),
        })
    }

    async fn booking_check(&self, supplier_booking_ref: &str, _agreement_ref: &str) -> Result<BookingAck, AdapterError> {
        Ok(BookingAck {
            supplier_booking_ref: supplier_booking_ref.to_string(),
            status: "CONFIRMED".into(),
        })
    }
}

fn base_price(vehicle_class: &str) -> f64 {
    match vehicle_class {
        "ECONOMY" => 39.99,
        "SUV" => 74.99,
        "LUXURY" => 129.99,
        _ => 49.99,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request() -> AvailabilityRequest {
        AvailabilityRequest {
            agreement_ref: "AGR-1".into(),
            pickup_unlocode: "USLAX".into(),
            dropoff_unlocode: "USSFO".into(),
            pickup_iso: Utc::now(),
            dropoff_iso: Utc::now(),
            driver_age: Some(30),
            residency_country: Some("US".into()),
            vehicle_classes: vec![],
        }
    }

    #[tokio::test]
    async fn offer_refs_are_deterministic() {
        let adapter = MockAdapter::new(vec!["USLAX".into()]);
        let req = request();
        let first = adapter.availability(&req).await.unwrap();
        let second = adapter.availability(&req).await.unwrap();
        assert_eq!(
            first.iter().map(|o| &o.supplier_offer_ref).collect::<Vec<_>>(),
            second.iter().map(|o| &o.supplier_offer_ref).collect::<Vec<_>>(),
        );
    }

    #[tokio::test]
    async fn unserved_pickup_returns_no_offers() {
        let adapter = MockAdapter::new(vec!["USLAX".into()]);
        let mut req = request();
        req.pickup_unlocode = "FRPAR".into();
        let offers = adapter.availability(&req).await.unwrap();
        assert!(offers.is_empty());
    }
}
