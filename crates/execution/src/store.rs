//! The Execution Store (C7, §4.8): the single writer of durable per-execution
//! and per-node-run state.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use flowright_core::{ExecutionId, FlowVersionId, NodeId, UserId};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StoreError;
use crate::model::{Execution, ExecutionStatus, NodeRun, Trigger};

/// Durable per-execution and per-node-run records; status transitions;
/// pinned-data lookups (§4.8).
///
/// Implementations must uphold two guarantees:
/// - **Durability**: once an Execution transitions to a terminal status, no
///   later read may observe a non-terminal one.
/// - **Ordering**: `NodeRun` writes for a given Execution are applied in the
///   order the caller issues them (scheduler-order), so a reader walking
///   runs by `finished_at` sees a causally consistent trace.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Create a new `pending` Execution row, returning its id.
    async fn create_execution(
        &self,
        flow_version_id: FlowVersionId,
        user_id: UserId,
        trigger: Trigger,
        input: Value,
        parent_execution_id: Option<ExecutionId>,
    ) -> ExecutionId;

    /// Move an Execution to `status`. Timestamps (`started_at`/`finished_at`)
    /// are stamped automatically on the relevant edges. A no-op status (the
    /// Execution is already in `status`) is accepted idempotently.
    async fn transition(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
    ) -> Result<(), StoreError>;

    /// Set the Execution's final output and, on a failing terminal
    /// transition, the `error` field naming the node that caused it.
    async fn finalize(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        output: Value,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    /// Upsert a `NodeRun`, idempotent on (`execution_id`, `node_id`, `attempt`).
    async fn record_node_run(&self, run: NodeRun) -> Result<(), StoreError>;

    /// Pinned output for `(flow_version_id, node_id)`, if a designer has
    /// pinned it (§4.6 "Pinned-data override").
    async fn load_pinned_data(&self, flow_version_id: FlowVersionId, node_id: &NodeId) -> Option<Value>;

    /// Read an Execution row.
    async fn find_execution(&self, execution_id: ExecutionId) -> Option<Execution>;

    /// All `NodeRun`s recorded for an Execution, in write order.
    async fn list_node_runs(&self, execution_id: ExecutionId) -> Vec<NodeRun>;
}

struct ExecutionEntry {
    execution: Execution,
    node_runs: Vec<NodeRun>,
}

/// An in-process [`ExecutionStore`] backed by a sharded map.
///
/// Each Execution's entry is guarded by its own mutex, so writes to
/// different Executions never contend (§5: "every write is keyed by
/// executionId, eliminating cross-execution contention").
#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: DashMap<ExecutionId, Mutex<ExecutionEntry>>,
    pinned: DashMap<(FlowVersionId, NodeId), Value>,
}

impl InMemoryExecutionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `output` for `(flow_version_id, node_id)`, overriding handler
    /// invocation for every future Execution of this `FlowVersion`.
    pub fn pin(&self, flow_version_id: FlowVersionId, node_id: NodeId, output: Value) {
        self.pinned.insert((flow_version_id, node_id), output);
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create_execution(
        &self,
        flow_version_id: FlowVersionId,
        user_id: UserId,
        trigger: Trigger,
        input: Value,
        parent_execution_id: Option<ExecutionId>,
    ) -> ExecutionId {
        let id = ExecutionId::new();
        let execution = Execution {
            id,
            flow_version_id,
            user_id,
            status: ExecutionStatus::Pending,
            trigger,
            input,
            output: Value::Null,
            parent_execution_id,
            started_at: None,
            finished_at: None,
            error: None,
        };
        self.executions.insert(
            id,
            Mutex::new(ExecutionEntry {
                execution,
                node_runs: Vec::new(),
            }),
        );
        id
    }

    async fn transition(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
    ) -> Result<(), StoreError> {
        let entry = self
            .executions
            .get(&execution_id)
            .ok_or(StoreError::ExecutionNotFound(execution_id))?;
        let mut guard = entry.lock();

        if guard.execution.status.is_terminal() && guard.execution.status != status {
            return Err(StoreError::AlreadyTerminal(execution_id));
        }

        if status == ExecutionStatus::Running && guard.execution.started_at.is_none() {
            guard.execution.started_at = Some(Utc::now());
        }
        if status.is_terminal() {
            guard.execution.finished_at = Some(Utc::now());
        }
        guard.execution.status = status;
        Ok(())
    }

    async fn finalize(
        &self,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        output: Value,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let entry = self
            .executions
            .get(&execution_id)
            .ok_or(StoreError::ExecutionNotFound(execution_id))?;
        let mut guard = entry.lock();

        if guard.execution.status.is_terminal() && guard.execution.status != status {
            return Err(StoreError::AlreadyTerminal(execution_id));
        }

        guard.execution.status = status;
        guard.execution.output = output;
        guard.execution.error = error;
        guard.execution.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn record_node_run(&self, run: NodeRun) -> Result<(), StoreError> {
        let entry = self
            .executions
            .get(&run.execution_id)
            .ok_or(StoreError::ExecutionNotFound(run.execution_id))?;
        let mut guard = entry.lock();

        if let Some(existing) = guard
            .node_runs
            .iter_mut()
            .find(|r| r.node_id == run.node_id && r.attempt == run.attempt)
        {
            *existing = run;
        } else {
            guard.node_runs.push(run);
        }
        Ok(())
    }

    async fn load_pinned_data(&self, flow_version_id: FlowVersionId, node_id: &NodeId) -> Option<Value> {
        self.pinned
            .get(&(flow_version_id, node_id.clone()))
            .map(|entry| entry.value().clone())
    }

    async fn find_execution(&self, execution_id: ExecutionId) -> Option<Execution> {
        self.executions
            .get(&execution_id)
            .map(|entry| entry.lock().execution.clone())
    }

    async fn list_node_runs(&self, execution_id: ExecutionId) -> Vec<NodeRun> {
        self.executions
            .get(&execution_id)
            .map(|entry| entry.lock().node_runs.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowright_core::{FlowVersionId, UserId};
    use serde_json::json;

    fn store() -> InMemoryExecutionStore {
        InMemoryExecutionStore::new()
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let store = store();
        let fv = FlowVersionId::new();
        let user = UserId::new();
        let id = store
            .create_execution(fv, user, Trigger::Manual, json!({"x": 1}), None)
            .await;

        let execution = store.find_execution(id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert_eq!(execution.input, json!({"x": 1}));
    }

    #[tokio::test]
    async fn transition_stamps_started_at_once() {
        let store = store();
        let id = store
            .create_execution(FlowVersionId::new(), UserId::new(), Trigger::Manual, Value::Null, None)
            .await;

        store.transition(id, ExecutionStatus::Running).await.unwrap();
        let first = store.find_execution(id).await.unwrap().started_at;

        store.transition(id, ExecutionStatus::Waiting).await.unwrap();
        let second = store.find_execution(id).await.unwrap().started_at;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn terminal_status_cannot_be_left() {
        let store = store();
        let id = store
            .create_execution(FlowVersionId::new(), UserId::new(), Trigger::Manual, Value::Null, None)
            .await;
        store.transition(id, ExecutionStatus::Cancelled).await.unwrap();

        let result = store.transition(id, ExecutionStatus::Running).await;
        assert!(matches!(result, Err(StoreError::AlreadyTerminal(_))));

        let execution = store.find_execution(id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn record_node_run_is_idempotent_on_attempt() {
        let store = store();
        let id = store
            .create_execution(FlowVersionId::new(), UserId::new(), Trigger::Manual, Value::Null, None)
            .await;
        let node_id = NodeId::from("setFields");

        let mut run = NodeRun::new(id, node_id.clone());
        store.record_node_run(run.clone()).await.unwrap();
        run.output = json!({"y": 1});
        run.status = crate::model::NodeRunStatus::Completed;
        store.record_node_run(run).await.unwrap();

        let runs = store.list_node_runs(id).await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].output, json!({"y": 1}));
    }

    #[tokio::test]
    async fn node_runs_preserve_write_order() {
        let store = store();
        let id = store
            .create_execution(FlowVersionId::new(), UserId::new(), Trigger::Manual, Value::Null, None)
            .await;

        for name in ["trigger", "setFields", "output"] {
            store
                .record_node_run(NodeRun::new(id, NodeId::from(name)))
                .await
                .unwrap();
        }

        let runs = store.list_node_runs(id).await;
        let order: Vec<_> = runs.iter().map(|r| r.node_id.to_string()).collect();
        assert_eq!(order, vec!["trigger", "setFields", "output"]);
    }

    #[tokio::test]
    async fn pinned_data_round_trips() {
        let store = store();
        let fv = FlowVersionId::new();
        let node_id = NodeId::from("http");
        assert!(store.load_pinned_data(fv, &node_id).await.is_none());

        store.pin(fv, node_id.clone(), json!({"status": 200}));
        let pinned = store.load_pinned_data(fv, &node_id).await.unwrap();
        assert_eq!(pinned, json!({"status": 200}));
    }

    #[tokio::test]
    async fn finalize_sets_output_error_and_finished_at() {
        let store = store();
        let id = store
            .create_execution(FlowVersionId::new(), UserId::new(), Trigger::Manual, Value::Null, None)
            .await;

        store
            .finalize(id, ExecutionStatus::Failed, Value::Null, Some("http failed".into()))
            .await
            .unwrap();

        let execution = store.find_execution(id).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.error.as_deref(), Some("http failed"));
        assert!(execution.finished_at.is_some());
    }

    #[tokio::test]
    async fn unknown_execution_errors() {
        let store = store();
        let bogus = ExecutionId::new();
        let result = store.transition(bogus, ExecutionStatus::Running).await;
        assert!(matches!(result, Err(StoreError::ExecutionNotFound(_))));
    }
}
