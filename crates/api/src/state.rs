//! The Control API's composition root (§9: "an explicit composition root
//! that constructs the NodeHandler Registry and the Credential Resolver at
//! startup and threads them through constructors. No hidden process-wide
//! state inside the engine").

use std::sync::Arc;

use flowright_engine::Scheduler;
use flowright_eventbus::EventBus;
use flowright_execution::ExecutionStore;
use flowright_node::NodeRegistry;
use flowright_workflow::FlowVersionStore;

use crate::subflow::ControlApiSubFlowStarter;

/// Shared state handed to every axum handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<NodeRegistry>,
    pub flow_versions: Arc<dyn FlowVersionStore>,
    pub store: Arc<dyn ExecutionStore>,
    pub scheduler: Arc<Scheduler>,
    pub events: Arc<EventBus>,
}

impl AppState {
    /// Wire the Scheduler, its `SubFlowStarter`, and the event bus together,
    /// breaking the Scheduler/`SubFlowStarter` cycle (§9) by constructing
    /// the starter first and binding it once the Scheduler is behind an `Arc`.
    #[must_use]
    pub fn new(
        registry: Arc<NodeRegistry>,
        credentials: Arc<dyn flowright_credential::CredentialResolver>,
        flow_versions: Arc<dyn FlowVersionStore>,
        store: Arc<dyn ExecutionStore>,
        events: Arc<EventBus>,
    ) -> Self {
        let sub_flow_starter = Arc::new(ControlApiSubFlowStarter::new(
            registry.clone(),
            flow_versions.clone(),
            store.clone(),
        ));
        let scheduler = Arc::new(
            Scheduler::new(registry.clone(), credentials, store.clone(), sub_flow_starter.clone())
                .with_event_bus(events.clone()),
        );
        sub_flow_starter.bind(&scheduler);

        Self {
            registry,
            flow_versions,
            store,
            scheduler,
            events,
        }
    }
}
