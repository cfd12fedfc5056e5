//! The Execution and NodeRun records (§3) and their status vocabularies.

use chrono::{DateTime, Utc};
use flowright_core::{ExecutionId, FlowVersionId, NodeId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What originated an [`Execution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    /// Started directly through the Control API.
    Manual,
    /// Started by an inbound webhook call.
    Webhook,
    /// Started by a cron-style schedule.
    Schedule,
    /// Started by an error-trigger node reacting to another Execution's failure.
    ErrorTrigger,
    /// Started by a `subWorkflow` node in a parent Execution.
    SubFlow,
}

/// The overall status of an [`Execution`] (§3).
///
/// §9 resolves the source's two overlapping status vocabularies
/// (`completed`/`failed`/`cancelled` vs. `running`/`waiting`) into this
/// single set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionStatus {
    /// Row created, not yet picked up by the scheduler.
    Pending,
    /// The execution loop is actively dispatching nodes.
    Running,
    /// Every in-flight node is parked (e.g. on a sub-flow or external signal).
    Waiting,
    /// Terminated: no non-skipped node ended in `failed`.
    Completed,
    /// Terminated: at least one non-skipped node ended in `failed` and was
    /// not caught by an error edge.
    Failed,
    /// Terminated: a cancellation request was fully processed.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns `true` if this status can never transition further.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One run of one `FlowVersion` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub flow_version_id: FlowVersionId,
    pub user_id: UserId,
    pub status: ExecutionStatus,
    pub trigger: Trigger,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    pub parent_execution_id: Option<ExecutionId>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Execution {
    /// Milliseconds between `started_at` and `finished_at`, if both are set.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// The status of a single [`NodeRun`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeRunStatus {
    Pending,
    Running,
    Waiting,
    Completed,
    Failed,
    /// The node sat on a branch that was pruned; it never ran.
    Skipped,
}

impl NodeRunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// One invocation attempt of one node within an [`Execution`] (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRun {
    pub execution_id: ExecutionId,
    pub node_id: NodeId,
    /// 1-based; consecutive per (execution, node) per §8's attempt monotonicity property.
    pub attempt: u32,
    pub status: NodeRunStatus,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub branches_taken: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<flowright_error::EngineError>,
    #[serde(default)]
    pub logs: Vec<String>,
    /// The NodeRun this one retries, if any.
    pub retry_of: Option<u32>,
}

impl NodeRun {
    /// A fresh, not-yet-started run for `node_id`'s first attempt.
    #[must_use]
    pub fn new(execution_id: ExecutionId, node_id: NodeId) -> Self {
        Self {
            execution_id,
            node_id,
            attempt: 1,
            status: NodeRunStatus::Pending,
            input: Value::Null,
            output: Value::Null,
            branches_taken: Vec::new(),
            started_at: None,
            finished_at: None,
            error: None,
            logs: Vec::new(),
            retry_of: None,
        }
    }

    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_status_terminal() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Waiting.is_terminal());
    }

    #[test]
    fn node_run_status_terminal() {
        assert!(NodeRunStatus::Completed.is_terminal());
        assert!(NodeRunStatus::Skipped.is_terminal());
        assert!(!NodeRunStatus::Running.is_terminal());
    }

    #[test]
    fn trigger_serde_camel_case() {
        let json = serde_json::to_string(&Trigger::ErrorTrigger).unwrap();
        assert_eq!(json, "\"errorTrigger\"");
        let json = serde_json::to_string(&Trigger::SubFlow).unwrap();
        assert_eq!(json, "\"subFlow\"");
    }

    #[test]
    fn display_matches_spec_vocabulary() {
        assert_eq!(ExecutionStatus::Waiting.to_string(), "waiting");
        assert_eq!(ExecutionStatus::Cancelled.to_string(), "cancelled");
    }
}
