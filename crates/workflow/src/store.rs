//! Read-side lookup of [`Flow`]/[`FlowVersion`] rows by id.
//!
//! Flow/FlowVersion authoring (create, edit, publish) is conventional CRUD
//! owned by a collaborator outside the engine; this trait is only the read
//! path the Control API needs to resolve `flowVersionId` into a concrete
//! graph before handing it to the Scheduler.

use async_trait::async_trait;
use dashmap::DashMap;
use flowright_core::FlowVersionId;

use crate::model::FlowVersion;

/// Looks up a [`FlowVersion`] by id. Implementations are expected to be
/// cheap and side-effect-free; the Control API calls this on every
/// `POST /executions`.
#[async_trait]
pub trait FlowVersionStore: Send + Sync {
    async fn get(&self, flow_version_id: FlowVersionId) -> Option<FlowVersion>;
}

/// An in-memory `FlowVersionStore`, seeded by whoever owns Flow authoring
/// (e.g. the composition root wiring a demo flow, or a future persistence
/// layer translating rows into `FlowVersion`s).
#[derive(Default)]
pub struct InMemoryFlowVersionStore {
    versions: DashMap<FlowVersionId, FlowVersion>,
}

impl InMemoryFlowVersionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a version.
    pub fn put(&self, version: FlowVersion) {
        self.versions.insert(version.id, version);
    }
}

#[async_trait]
impl FlowVersionStore for InMemoryFlowVersionStore {
    async fn get(&self, flow_version_id: FlowVersionId) -> Option<FlowVersion> {
        self.versions.get(&flow_version_id).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Definition;
    use flowright_core::FlowId;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryFlowVersionStore::new();
        let version = FlowVersion::draft(FlowId::new(), "v1", Definition::empty());
        let id = version.id;
        store.put(version);

        let found = store.get(id).await.expect("version should be found");
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn missing_version_is_none() {
        let store = InMemoryFlowVersionStore::new();
        assert!(store.get(FlowVersionId::new()).await.is_none());
    }
}
