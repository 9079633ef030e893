//! `BookingCore`, spec.md §4.7. Every operation re-validates the agreement,
//! talks to exactly one adapter, and journals a history event — the journal
//! write is best-effort and never turns a successful operation into a
//! failure (spec.md §4.7.3, §7 "Propagation").
use std::sync::Arc;

use adapters::{AdapterError, AdapterRegistry, BookingPayload};
use chrono::{DateTime, Utc};
use common::{CoreError, CoreResult, Id};
use dal::{AgreementStore, BookingStore, CompanyStore, HealthStore};
use metrics::{BookingOperationMetric, MetricsSink};
use models::{Booking, BookingHistoryEvent, BookingStatus, EventType, HistoryActor};
use serde_json::Value;

use crate::health::HealthMonitor;

pub struct CreateBookingRequest {
    pub agent_id: Id,
    pub source_id: Id,
    pub agreement_ref: String,
    pub supplier_offer_ref: Option<String>,
    pub idempotency_key: String,
    pub agent_booking_ref: Option<String>,
    pub pickup_unlocode: String,
    pub dropoff_unlocode: String,
    pub pickup_iso: DateTime<Utc>,
    pub dropoff_iso: DateTime<Utc>,
    pub vehicle_class: String,
    pub driver_age: i32,
    pub residency_country: String,
    pub customer_info: Option<Value>,
    pub payment_info: Option<Value>,
}

#[derive(Default)]
pub struct ModifyBookingRequest {
    /// Caller-supplied `agreement_ref`, if any. Treated as an override that
    /// must equal the booking's stored value (spec.md §9 "Dual booking
    /// schemas"); a mismatch is `INVALID_ARGUMENT`.
    pub agreement_ref: Option<String>,
    pub pickup_unlocode: Option<String>,
    pub dropoff_unlocode: Option<String>,
    pub pickup_iso: Option<DateTime<Utc>>,
    pub dropoff_iso: Option<DateTime<Utc>>,
    pub vehicle_class: Option<String>,
    pub customer_info: Option<Value>,
    pub payment_info: Option<Value>,
}

pub struct BookingCore<'a> {
    bookings: BookingStore<'a>,
    agreements: AgreementStore<'a>,
    companies: CompanyStore<'a>,
    health: HealthMonitor<'a>,
    registry: Arc<AdapterRegistry>,
    metrics: Arc<dyn MetricsSink>,
}

impl<'a> BookingCore<'a> {
    pub fn new(
        bookings: BookingStore<'a>,
        agreements: AgreementStore<'a>,
        companies: CompanyStore<'a>,
        health_store: HealthStore<'a>,
        health_config: config::HealthConfig,
        registry: Arc<AdapterRegistry>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            bookings,
            agreements,
            companies,
            health: HealthMonitor::new(health_store, health_config, metrics.clone()),
            registry,
            metrics,
        }
    }

    /// `Create`, spec.md §4.7.1.
    pub async fn create(&self, req: CreateBookingRequest) -> CoreResult<Booking> {
        if req.idempotency_key.trim().is_empty() {
            return Err(CoreError::InvalidArgument("idempotency_key is required".into()));
        }

        if let Some(existing) = self
            .bookings
            .find_idempotent(req.agent_id, "booking:create", &req.idempotency_key)
            .await?
        {
            return Ok(existing);
        }

        let agreement = self
            .agreements
            .get_active(req.agent_id, req.source_id, &req.agreement_ref)
            .await?
            .ok_or_else(|| {
                CoreError::precondition(
                    "AGREEMENT_INACTIVE",
                    format!("no ACTIVE agreement {} for source {}", req.agreement_ref, req.source_id),
                )
            })?;

        let adapter = self.resolve_adapter(req.source_id).await?;

        let payload = BookingPayload {
            agreement_ref: agreement.agreement_ref.clone(),
            supplier_offer_ref: req.supplier_offer_ref.clone(),
            idempotency_key: Some(req.idempotency_key.clone()),
            supplier_booking_ref: None,
            pickup_unlocode: Some(req.pickup_unlocode.clone()),
            dropoff_unlocode: Some(req.dropoff_unlocode.clone()),
            pickup_iso: Some(req.pickup_iso),
            dropoff_iso: Some(req.dropoff_iso),
            vehicle_class: Some(req.vehicle_class.clone()),
            customer_info: req.customer_info.clone(),
            payment_info: req.payment_info.clone(),
        };

        let (ack, _latency_ms) = self.call_adapter(req.source_id, &adapter, "booking_create", |a| a.booking_create(&payload)).await?;

        let payload_snapshot = serde_json::to_value(&ack).unwrap_or(Value::Null);
        let booking = Booking {
            id: Id::new(),
            agent_id: req.agent_id,
            source_id: req.source_id,
            agreement_ref: agreement.agreement_ref,
            supplier_booking_ref: Some(ack.supplier_booking_ref),
            agent_booking_ref: req.agent_booking_ref,
            idempotency_key: Some(req.idempotency_key.clone()),
            status: parse_status(&ack.status),
            pickup_unlocode: req.pickup_unlocode,
            dropoff_unlocode: req.dropoff_unlocode,
            pickup_iso: req.pickup_iso,
            dropoff_iso: req.dropoff_iso,
            vehicle_class: req.vehicle_class,
            make_model: None,
            rate_plan: None,
            driver_age: req.driver_age,
            residency_country: req.residency_country,
            customer_info: req.customer_info,
            payment_info: req.payment_info,
            payload_snapshot,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        self.bookings
            .insert_with_idempotency_key(&booking, "booking:create", &req.idempotency_key)
            .await?;

        self.journal(booking.id, EventType::Created, None, &booking, None).await;
        self.record_outcome(req.agent_id, req.source_id, "create", true).await;

        Ok(booking)
    }

    /// `Modify`, spec.md §4.7.2.
    pub async fn modify(&self, source_id: Id, supplier_booking_ref: &str, req: ModifyBookingRequest) -> CoreResult<Booking> {
        let before = self.locate(source_id, supplier_booking_ref).await?;
        check_agreement_ref_override(&before, req.agreement_ref.as_deref())?;
        let agreement = self.require_active_agreement(&before, source_id).await?;
        let adapter = self.resolve_adapter(source_id).await?;

        let payload = BookingPayload {
            agreement_ref: agreement.agreement_ref.clone(),
            supplier_offer_ref: None,
            idempotency_key: None,
            supplier_booking_ref: Some(supplier_booking_ref.to_string()),
            pickup_unlocode: req.pickup_unlocode.clone(),
            dropoff_unlocode: req.dropoff_unlocode.clone(),
            pickup_iso: req.pickup_iso,
            dropoff_iso: req.dropoff_iso,
            vehicle_class: req.vehicle_class.clone(),
            customer_info: req.customer_info.clone(),
            payment_info: req.payment_info.clone(),
        };

        let (ack, _latency_ms) = self.call_adapter(source_id, &adapter, "booking_modify", |a| a.booking_modify(&payload)).await?;

        let after = self
            .bookings
            .apply_update(
                before.id,
                parse_status(&ack.status),
                Some(ack.supplier_booking_ref),
                req.pickup_unlocode,
                req.dropoff_unlocode,
                req.pickup_iso,
                req.dropoff_iso,
                req.vehicle_class,
                serde_json::to_value(&ack).unwrap_or(Value::Null),
            )
            .await?;

        self.journal(before.id, EventType::Modified, Some(&before), &after, None).await;
        self.record_outcome(before.agent_id, source_id, "modify", true).await;

        Ok(after)
    }

    /// `Cancel`, spec.md §4.7.2.
    pub async fn cancel(&self, source_id: Id, supplier_booking_ref: &str, agreement_ref: Option<&str>) -> CoreResult<Booking> {
        let before = self.locate(source_id, supplier_booking_ref).await?;
        check_agreement_ref_override(&before, agreement_ref)?;
        let agreement = self.require_active_agreement(&before, source_id).await?;
        let adapter = self.resolve_adapter(source_id).await?;

        let (ack, _latency_ms) = self
            .call_adapter(source_id, &adapter, "booking_cancel", |a| {
                a.booking_cancel(supplier_booking_ref, &agreement.agreement_ref)
            })
            .await?;

        let after = self
            .bookings
            .apply_update(
                before.id,
                parse_status(&ack.status),
                Some(ack.supplier_booking_ref),
                None,
                None,
                None,
                None,
                None,
                serde_json::to_value(&ack).unwrap_or(Value::Null),
            )
            .await?;

        self.journal(before.id, EventType::Cancelled, Some(&before), &after, None).await;
        self.record_outcome(before.agent_id, source_id, "cancel", true).await;

        Ok(after)
    }

    /// `Check`, spec.md §4.7.2: re-synchronizes status from the supplier.
    pub async fn check(&self, source_id: Id, supplier_booking_ref: &str, agreement_ref: Option<&str>) -> CoreResult<Booking> {
        let before = self.locate(source_id, supplier_booking_ref).await?;
        check_agreement_ref_override(&before, agreement_ref)?;
        let agreement = self.require_active_agreement(&before, source_id).await?;
        let adapter = self.resolve_adapter(source_id).await?;

        let (ack, _latency_ms) = self
            .call_adapter(source_id, &adapter, "booking_check", |a| {
                a.booking_check(supplier_booking_ref, &agreement.agreement_ref)
            })
            .await?;

        let after = self
            .bookings
            .apply_update(
                before.id,
                parse_status(&ack.status),
                Some(ack.supplier_booking_ref),
                None,
                None,
                None,
                None,
                None,
                serde_json::to_value(&ack).unwrap_or(Value::Null),
            )
            .await?;

        self.journal(before.id, EventType::StatusChanged, Some(&before), &after, None).await;
        self.record_outcome(before.agent_id, source_id, "check", true).await;

        Ok(after)
    }

    pub async fn history(&self, booking_id: Id) -> CoreResult<Vec<BookingHistoryEvent>> {
        self.bookings.list_history(booking_id).await
    }

    async fn locate(&self, source_id: Id, supplier_booking_ref: &str) -> CoreResult<Booking> {
        self.bookings
            .get_by_supplier_ref(source_id, supplier_booking_ref)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {supplier_booking_ref} at source {source_id}")))
    }

    async fn require_active_agreement(&self, booking: &Booking, source_id: Id) -> CoreResult<models::Agreement> {
        self.agreements
            .get_active(booking.agent_id, source_id, &booking.agreement_ref)
            .await?
            .ok_or_else(|| {
                CoreError::precondition(
                    "AGREEMENT_INACTIVE",
                    format!("agreement {} is no longer ACTIVE", booking.agreement_ref),
                )
            })
    }

    async fn resolve_adapter(&self, source_id: Id) -> CoreResult<Arc<dyn adapters::SourceAdapter>> {
        let company = self
            .companies
            .get(source_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("company {source_id}")))?;
        let endpoint = company
            .endpoint
            .ok_or_else(|| CoreError::Unavailable(format!("source {source_id} has no endpoint configured")))?;
        self.registry.get_or_init(source_id, &endpoint).await
    }

    /// Times the adapter call, records a health sample and an
    /// `AdapterLatencyMetric`-equivalent latency observation regardless of
    /// outcome, and maps any `AdapterError` onto `CoreError` (spec.md §4.7
    /// step 4: "On adapter failure, surface the mapped error and do not
    /// commit a booking").
    async fn call_adapter<F, Fut, T>(
        &self,
        source_id: Id,
        adapter: &Arc<dyn adapters::SourceAdapter>,
        operation: &str,
        call: F,
    ) -> CoreResult<(T, u64)>
    where
        F: FnOnce(&Arc<dyn adapters::SourceAdapter>) -> Fut,
        Fut: std::future::Future<Output = Result<T, AdapterError>>,
    {
        let started = tokio::time::Instant::now();
        let outcome = call(adapter).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = self.health.record_metric(source_id, latency_ms, outcome.is_ok()).await {
            tracing::error!(%source_id, error = %e, "failed to record health sample");
        }

        match outcome {
            Ok(value) => Ok((value, latency_ms)),
            Err(e) => {
                tracing::warn!(%source_id, %operation, error = %e, "adapter call failed");
                Err(map_adapter_error(e))
            }
        }
    }

    async fn journal(&self, booking_id: Id, event_type: EventType, before: Option<&Booking>, after: &Booking, actor: Option<String>) {
        let before_state = before.map(|b| serde_json::to_value(b).unwrap_or(Value::Null));
        let after_state = serde_json::to_value(after).unwrap_or(Value::Null);
        let changes = before.map(|b| compute_changes(b, after));

        if let Err(e) = self
            .bookings
            .append_history(booking_id, event_type, before_state, Some(after_state), changes, actor, HistoryActor::System)
            .await
        {
            tracing::error!(%booking_id, error = %e, "failed to journal booking history, continuing");
        }
    }

    async fn record_outcome(&self, agent_id: Id, source_id: Id, operation: &str, success: bool) {
        self.metrics
            .record(
                BookingOperationMetric {
                    ts: metrics::Timestamp::now(),
                    agent_id,
                    source_id,
                    operation: operation.to_string(),
                    outcome: if success { "SUCCESS".to_string() } else { "FAILURE".to_string() },
                }
                .into(),
            )
            .await;
    }
}

/// Caller-provided `agreement_ref` is an override on `Modify`/`Cancel`/
/// `Check` and must equal the booking's stored value (spec.md §9 "Dual
/// booking schemas").
fn check_agreement_ref_override(booking: &Booking, provided: Option<&str>) -> CoreResult<()> {
    match provided {
        Some(r) if r != booking.agreement_ref => Err(CoreError::InvalidArgument(format!(
            "agreement_ref {r} does not match booking's agreement_ref {}",
            booking.agreement_ref
        ))),
        _ => Ok(()),
    }
}

fn map_adapter_error(e: AdapterError) -> CoreError {
    match e {
        AdapterError::Transport(msg) => CoreError::Internal(anyhow::anyhow!(msg)),
        AdapterError::Timeout(ms) => CoreError::Internal(anyhow::anyhow!("source call timed out after {ms}ms")),
        AdapterError::RemoteValidation(msg) => CoreError::InvalidArgument(msg),
        AdapterError::RemoteServer(msg) => CoreError::Unavailable(msg),
    }
}

fn parse_status(status: &str) -> BookingStatus {
    match status.to_ascii_uppercase().as_str() {
        "CONFIRMED" => BookingStatus::Confirmed,
        "CANCELLED" | "CANCELED" => BookingStatus::Cancelled,
        "FAILED" => BookingStatus::Failed,
        _ => BookingStatus::Requested,
    }
}

/// The fixed field set of spec.md §4.7.3, as a flat `{field: {from, to}}` map
/// over only the fields that actually changed.
fn compute_changes(before: &Booking, after: &Booking) -> Value {
    let mut changes = serde_json::Map::new();

    macro_rules! diff_field {
        ($name:literal, $field:ident) => {
            if before.$field != after.$field {
                changes.insert(
                    $name.to_string(),
                    serde_json::json!({ "from": before.$field, "to": after.$field }),
                );
            }
        };
    }

    diff_field!("status", status);
    diff_field!("pickup_unlocode", pickup_unlocode);
    diff_field!("dropoff_unlocode", dropoff_unlocode);
    diff_field!("pickup_iso", pickup_iso);
    diff_field!("dropoff_iso", dropoff_iso);
    diff_field!("vehicle_class", vehicle_class);
    diff_field!("make_model", make_model);
    diff_field!("rate_plan", rate_plan);
    diff_field!("driver_age", driver_age);
    diff_field!("residency_country", residency_country);
    diff_field!("customer_info", customer_info);
    diff_field!("payment_info", payment_info);
    diff_field!("supplier_booking_ref", supplier_booking_ref);
    diff_field!("agreement_ref", agreement_ref);

    Value::Object(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_booking(agreement_ref: &str) -> Booking {
        Booking {
            id: Id::new(),
            agent_id: Id::new(),
            source_id: Id::new(),
            agreement_ref: agreement_ref.to_string(),
            supplier_booking_ref: Some("SUP-1".to_string()),
            agent_booking_ref: None,
            idempotency_key: Some("K".to_string()),
            status: BookingStatus::Requested,
            pickup_unlocode: "USLAX".to_string(),
            dropoff_unlocode: "USLAX".to_string(),
            pickup_iso: Utc::now(),
            dropoff_iso: Utc::now(),
            vehicle_class: "ECON".to_string(),
            make_model: None,
            rate_plan: None,
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
    fn agreement_ref_override_matching_is_accepted() {
        let booking = sample_booking("AGR-1");
        assert!(check_agreement_ref_override(&booking, Some("AGR-1")).is_ok());
        assert!(check_agreement_ref_override(&booking, None).is_ok());
    }

    #[test]
    fn agreement_ref_override_mismatch_is_invalid_argument() {
        let booking = sample_booking("AGR-1");
        assert!(matches!(
            check_agreement_ref_override(&booking, Some("AGR-2")),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn parses_known_statuses_case_insensitively() {
        assert_eq!(parse_status("confirmed"), BookingStatus::Confirmed);
        assert_eq!(parse_status("CANCELLED"), BookingStatus::Cancelled);
        assert_eq!(parse_status("canceled"), BookingStatus::Cancelled);
        assert_eq!(parse_status("failed"), BookingStatus::Failed);
    }

    #[test]
    fn unknown_status_defaults_to_requested() {
        assert_eq!(parse_status("PENDING_REVIEW"), BookingStatus::Requested);
    }

    #[test]
    fn transport_errors_map_to_internal_with_cause() {
        assert!(matches!(map_adapter_error(AdapterError::Transport("x".into())), CoreError::Internal(_)));
    }

    #[test]
    fn remote_server_errors_map_to_unavailable() {
        assert!(matches!(map_adapter_error(AdapterError::RemoteServer("x".into())), CoreError::Unavailable(_)));
    }

    #[test]
    fn timeout_maps_to_internal_with_cause() {
        assert!(matches!(map_adapter_error(AdapterError::Timeout(5000)), CoreError::Internal(_)));
    }

    #[test]
    fn remote_validation_maps_to_invalid_argument() {
        assert!(matches!(map_adapter_error(AdapterError::RemoteValidation("x".into())), CoreError::InvalidArgument(_)));
    }
}
