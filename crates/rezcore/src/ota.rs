//! `OtaEnvelopeBuilder`, spec.md §4.9: a pure transformation from internal
//! records into a nested OTA-flavored response shape, plus one bounded
//! batch lookup of source `companyName` — the only I/O this module performs.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CoreResult, Id};
use dal::CompanyStore;
use models::{Booking, OfferOrMarker};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct OfferLine {
    pub supplier_offer_ref: String,
    pub vehicle_class: String,
    pub make_model: String,
    pub currency: String,
    pub total_price: String,
    pub availability_status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VendorSection {
    pub source_id: Id,
    pub vendor_name: String,
    pub pickup_unlocode: Option<String>,
    pub dropoff_unlocode: Option<String>,
    pub offers: Vec<OfferLine>,
    pub markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityEnvelope {
    pub request_criteria: Value,
    pub vendors: Vec<VendorSection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RentalCore {
    pub agreement_ref: String,
    pub supplier_booking_ref: Option<String>,
    pub pickup_unlocode: String,
    pub dropoff_unlocode: String,
    pub pickup_iso: DateTime<Utc>,
    pub dropoff_iso: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleDetail {
    pub vehicle_class: String,
    pub make_model: Option<String>,
}

/// No pricing logic lives here (spec.md Non-goal); this only surfaces the
/// supplier's own rate-plan label already stored on the booking.
#[derive(Debug, Clone, Serialize)]
pub struct RateDetail {
    pub rate_plan: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationEnvelope {
    pub booking_id: Id,
    pub vendor_name: String,
    pub status: String,
    pub rental: RentalCore,
    pub vehicle: VehicleDetail,
    pub rate: RateDetail,
}

pub struct OtaEnvelopeBuilder<'a> {
    companies: CompanyStore<'a>,
}

impl<'a> OtaEnvelopeBuilder<'a> {
    pub fn new(companies: CompanyStore<'a>) -> Self {
        Self { companies }
    }

    /// Groups `results` by `source_id` into vendor sections, resolving each
    /// vendor's display name in one batch lookup up front.
    pub async fn availability_envelope(
        &self,
        request_criteria: Value,
        pickup_unlocode: Option<&str>,
        dropoff_unlocode: Option<&str>,
        results: &[(Id, Vec<OfferOrMarker>)],
    ) -> CoreResult<AvailabilityEnvelope> {
        let source_ids: Vec<Id> = results.iter().map(|(source_id, _)| *source_id).collect();
        let names = self.company_names(&source_ids).await?;

        let vendors = results
            .iter()
            .map(|(source_id, items)| {
                let mut offers = Vec::new();
                let mut markers = Vec::new();
                for item in items {
                    match item {
                        OfferOrMarker::Offer(offer) => offers.push(OfferLine {
                            supplier_offer_ref: offer.supplier_offer_ref.clone(),
                            vehicle_class: offer.vehicle_class.clone(),
                            make_model: offer.make_model.clone(),
                            currency: offer.currency.clone(),
                            total_price: offer.total_price.clone(),
                            availability_status: offer.availability_status.clone(),
                        }),
                        OfferOrMarker::Marker { error, message } => {
                            markers.push(message.clone().unwrap_or_else(|| error.to_string()))
                        }
                    }
                }
                VendorSection {
                    source_id: *source_id,
                    vendor_name: names.get(source_id).cloned().unwrap_or_else(|| source_id.to_string()),
                    pickup_unlocode: pickup_unlocode.map(str::to_string),
                    dropoff_unlocode: dropoff_unlocode.map(str::to_string),
                    offers,
                    markers,
                }
            })
            .collect();

        Ok(AvailabilityEnvelope { request_criteria, vendors })
    }

    pub async fn reservation_envelope(&self, booking: &Booking) -> CoreResult<ReservationEnvelope> {
        let names = self.company_names(&[booking.source_id]).await?;
        Ok(build_reservation_envelope(booking, names.get(&booking.source_id).cloned()))
    }

    async fn company_names(&self, source_ids: &[Id]) -> CoreResult<HashMap<Id, String>> {
        let mut unique: Vec<Id> = source_ids.to_vec();
        unique.sort();
        unique.dedup();

        let mut names = HashMap::with_capacity(unique.len());
        for source_id in unique {
            if let Some(company) = self.companies.get(source_id).await? {
                names.insert(source_id, company.name);
            }
        }
        Ok(names)
    }
}

/// The pure half of `reservation_envelope`: given a resolved vendor name (or
/// none), builds the envelope with no I/O. Exercised directly by tests to
/// verify "same inputs ⇒ byte-equal envelopes modulo the company-name
/// lookup" (spec.md §8).
fn build_reservation_envelope(booking: &Booking, vendor_name: Option<String>) -> ReservationEnvelope {
    ReservationEnvelope {
        booking_id: booking.id,
        vendor_name: vendor_name.unwrap_or_else(|| booking.source_id.to_string()),
        status: booking.status.to_string(),
        rental: RentalCore {
            agreement_ref: booking.agreement_ref.clone(),
            supplier_booking_ref: booking.supplier_booking_ref.clone(),
            pickup_unlocode: booking.pickup_unlocode.clone(),
            dropoff_unlocode: booking.dropoff_unlocode.clone(),
            pickup_iso: booking.pickup_iso,
            dropoff_iso: booking.dropoff_iso,
        },
        vehicle: VehicleDetail {
            vehicle_class: booking.vehicle_class.clone(),
            make_model: booking.make_model.clone(),
        },
        rate: RateDetail {
            rate_plan: booking.rate_plan.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::BookingStatus;

    fn sample_booking() -> Booking {
        Booking {
            id: Id::new(),
            agent_id: Id::new(),
            source_id: Id::new(),
            agreement_ref: "AGR-1".to_string(),
            supplier_booking_ref: Some("SUP-1".to_string()),
            agent_booking_ref: None,
            idempotency_key: Some("K".to_string()),
            status: BookingStatus::Confirmed,
            pickup_unlocode: "USLAX".to_string(),
            dropoff_unlocode: "USLAX".to_string(),
            pickup_iso: Utc::now(),
            dropoff_iso: Utc::now(),
            vehicle_class: "ECON".to_string(),
            make_model: Some("Toyota Corolla".to_string()),
            rate_plan: Some("STANDARD".to_string()),
            driver_age: 30,
            residency_country: "US".to_string(),
            customer_info: None,
            payment_info: None,
            payload_snapshot: Value::Null,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pure_transform_is_deterministic_given_same_vendor_name() {
        let booking = sample_booking();
        let a = build_reservation_envelope(&booking, Some("Acme Rentals".to_string()));
        let b = build_reservation_envelope(&booking, Some("Acme Rentals".to_string()));
        assert_eq!(serde_json::to_value(&a).unwrap(), serde_json::to_value(&b).unwrap());
    }

    #[test]
    fn missing_vendor_name_falls_back_to_source_id() {
        let booking = sample_booking();
        let envelope = build_reservation_envelope(&booking, None);
        assert_eq!(envelope.vendor_name, booking.source_id.to_string());
    }
}
