use std::sync::Arc;

use common::{CoreError, CoreResult, Id, SourceEndpoint, Transport};
use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::adapter::SourceAdapter;
use crate::mock::MockAdapter;

/// Keyed cache `sourceId -> SourceAdapter`, lazily materialized from the
/// source's transport config (spec.md §4.2). Concurrent lookups for the
/// same key deduplicate onto a single construction via `OnceCell`, mirroring
/// the single-flight `OnceCell<Sender<Action>>` pattern the teacher uses for
/// its `Dispatcher` (`workflows::entry::Dispatcher`).
#[derive(Default)]
pub struct AdapterRegistry {
    cells: DashMap<Id, Arc<OnceCell<Arc<dyn SourceAdapter>>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self { cells: DashMap::new() }
    }

    /// Resolves the adapter for `source_id`, building it from `endpoint` iff
    /// no adapter has been constructed yet for this key. Only one caller per
    /// key ever executes the constructor; other concurrent callers await it.
    pub async fn get_or_init(
        &self,
        source_id: Id,
        endpoint: &SourceEndpoint,
    ) -> CoreResult<Arc<dyn SourceAdapter>> {
        let cell = self
            .cells
            .entry(source_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let endpoint = endpoint.clone();
        cell.get_or_try_init(|| async move { build_adapter(source_id, &endpoint) })
            .await
            .cloned()
    }

    /// Drops the cached adapter for `source_id` so the next `get_or_init`
    /// rebuilds it — called on source configuration change (spec.md §4.2
    /// "Invalidation on source configuration change").
    pub fn invalidate(&self, source_id: Id) {
        self.cells.remove(&source_id);
    }
}

fn build_adapter(source_id: Id, endpoint: &SourceEndpoint) -> CoreResult<Arc<dyn SourceAdapter>> {
    tracing::info!(%source_id, transport = %endpoint.transport, "constructing source adapter");
    match endpoint.transport {
        Transport::Mock => Ok(Arc::new(MockAdapter::new(vec![
            endpoint.address.clone(),
        ]))),
        Transport::Grpc | Transport::Http => Err(CoreError::Unavailable(format!(
            "no {} adapter implementation is wired for source {source_id} (Non-goal: real supplier transports)",
            endpoint.transport
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_source_resolves_to_same_adapter() {
        let registry = AdapterRegistry::new();
        let source_id = Id::new();
        let endpoint = SourceEndpoint {
            transport: Transport::Mock,
            address: "USLAX".into(),
            auth: None,
        };

        let a = registry.get_or_init(source_id, &endpoint).await.unwrap();
        let b = registry.get_or_init(source_id, &endpoint).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn invalidate_forces_rebuild() {
        let registry = AdapterRegistry::new();
        let source_id = Id::new();
        let endpoint = SourceEndpoint {
            transport: Transport::Mock,
            address: "USLAX".into(),
            auth: None,
        };

        let a = registry.get_or_init(source_id, &endpoint).await.unwrap();
        registry.invalidate(source_id);
        let b = registry.get_or_init(source_id, &endpoint).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
