//! The callback a `subWorkflow` node uses to start a child Execution,
//! without the Scheduler depending on whatever owns the Control API (§9:
//! "the Scheduler depends only on the Execution Store and a `SubFlowStarter`
//! callback, which the Control API wires at construction").

use async_trait::async_trait;
use flowright_core::{ExecutionId, FlowVersionId, UserId};
use serde_json::Value;

use crate::error::EngineError;

/// Starts a child Execution on behalf of a `subWorkflow` node.
#[async_trait]
pub trait SubFlowStarter: Send + Sync {
    /// Start `flow_version_id` with `input`, recording `parent_execution_id`
    /// so cancellation of the parent cascades to the child (§4.6).
    async fn start_sub_execution(
        &self,
        flow_version_id: FlowVersionId,
        user_id: UserId,
        input: Value,
        parent_execution_id: ExecutionId,
    ) -> Result<ExecutionId, EngineError>;

    /// Whether `execution_id` has reached a terminal status, and if so its
    /// output. Polled by a waiting `subWorkflow` node when `waitForCompletion=true`.
    async fn poll_sub_execution(&self, execution_id: ExecutionId) -> Option<Value>;

    /// Cascade cancellation to a child Execution.
    async fn cancel_sub_execution(&self, execution_id: ExecutionId);
}
