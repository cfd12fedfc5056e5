//! The `SubFlowStarter` the Control API wires into the Scheduler at
//! construction (§9: "The Control API depends on the Scheduler; the
//! Scheduler depends only on the Execution Store and a `SubFlowStarter`
//! callback, which the Control API wires at construction").
//!
//! Starting a sub-flow needs the Scheduler itself (to drive the child
//! Execution), but the Scheduler is constructed *with* this starter --
//! a direct cycle. It is broken the way the source's `ObjectProvider`
//! broke its own Scheduler/ExecutionService cycle: this struct is built
//! first holding nothing but a `Weak` slot, handed into `Scheduler::new`,
//! and only after the Scheduler exists is the slot filled in.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use flowright_core::{ExecutionId, FlowVersionId, UserId};
use flowright_engine::{EngineError, Scheduler};
use flowright_execution::{ExecutionStore, Trigger};
use flowright_node::NodeRegistry;
use flowright_workflow::{FlowVersionStore, GraphValidator};
use serde_json::Value;

pub struct ControlApiSubFlowStarter {
    registry: Arc<NodeRegistry>,
    flow_versions: Arc<dyn FlowVersionStore>,
    store: Arc<dyn ExecutionStore>,
    scheduler: OnceLock<Weak<Scheduler>>,
}

impl ControlApiSubFlowStarter {
    #[must_use]
    pub fn new(
        registry: Arc<NodeRegistry>,
        flow_versions: Arc<dyn FlowVersionStore>,
        store: Arc<dyn ExecutionStore>,
    ) -> Self {
        Self {
            registry,
            flow_versions,
            store,
            scheduler: OnceLock::new(),
        }
    }

    /// Fill in the back-reference once the Scheduler that owns this starter
    /// has been wrapped in an `Arc`. Must be called exactly once, before
    /// any `subWorkflow` node runs.
    pub fn bind(&self, scheduler: &Arc<Scheduler>) {
        let _ = self.scheduler.set(Arc::downgrade(scheduler));
    }

    fn scheduler(&self) -> Option<Arc<Scheduler>> {
        self.scheduler.get().and_then(Weak::upgrade)
    }
}

#[async_trait]
impl flowright_engine::SubFlowStarter for ControlApiSubFlowStarter {
    async fn start_sub_execution(
        &self,
        flow_version_id: FlowVersionId,
        user_id: UserId,
        input: Value,
        parent_execution_id: ExecutionId,
    ) -> Result<ExecutionId, EngineError> {
        let scheduler = self
            .scheduler()
            .expect("ControlApiSubFlowStarter::bind must run before any subWorkflow node executes");

        let flow_version = self
            .flow_versions
            .get(flow_version_id)
            .await
            .ok_or(EngineError::FlowVersionNotFound(flow_version_id))?;

        let report = GraphValidator::new(&self.registry).validate(&flow_version.definition)?;

        let execution_id = self
            .store
            .create_execution(flow_version_id, user_id, Trigger::SubFlow, input, Some(parent_execution_id))
            .await;
        let execution = self
            .store
            .find_execution(execution_id)
            .await
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;

        tokio::spawn(async move {
            if let Err(error) = scheduler.execute(&flow_version, &report, execution).await {
                tracing::error!(%execution_id, %error, "sub-flow execution failed to run to completion");
            }
        });

        Ok(execution_id)
    }

    async fn poll_sub_execution(&self, execution_id: ExecutionId) -> Option<Value> {
        let execution = self.store.find_execution(execution_id).await?;
        execution.status.is_terminal().then_some(execution.output)
    }

    async fn cancel_sub_execution(&self, execution_id: ExecutionId) {
        if let Some(scheduler) = self.scheduler() {
            scheduler.cancel(execution_id);
        }
    }
}
