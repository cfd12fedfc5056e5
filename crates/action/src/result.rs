//! The tagged result a handler's `execute` returns (§4.3).

use flowright_core::JsonMap;
use flowright_error::ErrorKind;

/// What a `Waiting` node is parked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitingOn {
    /// An external signal correlated by an opaque key (e.g. a webhook callback id).
    Signal {
        /// The correlation key the resuming caller must present.
        key: String,
    },
    /// A timer; the scheduler resumes the node once it elapses.
    Timer {
        /// How long to wait before resuming, in milliseconds.
        delay_ms: u64,
    },
    /// Human approval.
    Approval {
        /// Identifier of who must approve.
        approver: String,
    },
}

/// The outcome of one handler invocation (§4.3).
///
/// The Scheduler (C6) matches on this to decide what happens next: route
/// output to successors, park the node, or route through the error edges
/// and retry policy (C8).
#[derive(Debug, Clone)]
pub enum NodeExecutionResult {
    /// The node completed. `branches_to_follow == None` means "follow every
    /// outgoing non-error edge"; `Some(handles)` restricts to those handles.
    Success {
        /// The node's output map, addressable downstream via `$node["id"].json`.
        output: JsonMap,
        /// Restricts which declared output handles are followed, or `None` for all.
        branches_to_follow: Option<Vec<String>>,
        /// Arbitrary handler-reported metadata (timing, counts, etc).
        metadata: JsonMap,
    },
    /// The node parked itself pending an external event. Requires
    /// `supports_async` in the handler's metadata.
    Waiting {
        /// Opaque token a later `resume(resumeToken, payload)` call must present.
        resume_token: String,
        /// What the node is waiting on.
        waiting_on: WaitingOn,
    },
    /// The node failed. C8 decides whether to retry, route through an error
    /// edge, or fail the Execution.
    Failure {
        /// The machine-readable error kind.
        error_kind: ErrorKind,
        /// Human-readable detail.
        message: String,
        /// Arbitrary handler-reported metadata captured before the failure.
        metadata: JsonMap,
    },
}

impl NodeExecutionResult {
    /// Build a `Success` result following every outgoing non-error edge.
    #[must_use]
    pub fn success(output: JsonMap) -> Self {
        Self::Success {
            output,
            branches_to_follow: None,
            metadata: JsonMap::new(),
        }
    }

    /// Build a `Success` result restricted to the given output handles.
    #[must_use]
    pub fn branch(output: JsonMap, handles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Success {
            output,
            branches_to_follow: Some(handles.into_iter().map(Into::into).collect()),
            metadata: JsonMap::new(),
        }
    }

    /// Build a `Failure` result with no metadata.
    #[must_use]
    pub fn failure(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            error_kind,
            message: message.into(),
            metadata: JsonMap::new(),
        }
    }

    /// Whether this result is `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether this result is `Waiting`.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting { .. })
    }

    /// Whether this result is `Failure`.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_follows_every_edge_by_default() {
        let r = NodeExecutionResult::success(json!({"ok": true}).as_object().unwrap().clone());
        match r {
            NodeExecutionResult::Success {
                branches_to_follow, ..
            } => assert!(branches_to_follow.is_none()),
            _ => panic!("expected Success"),
        }
        assert!(NodeExecutionResult::success(JsonMap::new()).is_success());
    }

    #[test]
    fn branch_restricts_to_named_handles() {
        let r = NodeExecutionResult::branch(JsonMap::new(), ["true"]);
        match r {
            NodeExecutionResult::Success {
                branches_to_follow, ..
            } => assert_eq!(branches_to_follow, Some(vec!["true".to_owned()])),
            _ => panic!("expected Success"),
        }
    }

    #[test]
    fn failure_carries_kind_and_message() {
        let r = NodeExecutionResult::failure(ErrorKind::RemoteError, "503 from upstream");
        assert!(r.is_failure());
        match r {
            NodeExecutionResult::Failure { error_kind, message, .. } => {
                assert_eq!(error_kind, ErrorKind::RemoteError);
                assert_eq!(message, "503 from upstream");
            }
            _ => panic!("expected Failure"),
        }
    }

    #[test]
    fn waiting_carries_resume_token() {
        let r = NodeExecutionResult::Waiting {
            resume_token: "tok-123".into(),
            waiting_on: WaitingOn::Approval {
                approver: "alice".into(),
            },
        };
        assert!(r.is_waiting());
    }
}
