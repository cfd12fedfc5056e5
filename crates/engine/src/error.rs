//! Errors the Scheduler can surface before or outside of normal per-node
//! failure handling (per-node failures are carried in `NodeRun.error`
//! instead -- see §7).

use flowright_core::{ExecutionId, FlowVersionId};
use flowright_credential::CredentialError;
use flowright_execution::StoreError;
use flowright_node::NodeRegistryError;
use flowright_workflow::ValidationError;
use thiserror::Error;

/// Failures that stop an Execution from starting or from making progress,
/// as opposed to a single node's runtime failure (which is recorded on its
/// `NodeRun` and routed through retry/error-edge policy instead).
#[derive(Debug, Error)]
pub enum EngineError {
    /// §4.5: "no Execution row transitions past `pending`" on invalid graphs.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The Execution Store rejected an operation (e.g. double-terminal transition).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A node's declared `node_type` has no registered handler.
    #[error(transparent)]
    Registry(#[from] NodeRegistryError),

    /// A handler's declared `credentialType` could not be resolved.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// No `FlowVersion` exists for the id the caller supplied.
    #[error("flow version `{0}` not found")]
    FlowVersionNotFound(FlowVersionId),

    /// The `FlowVersion` is not `published` and the caller did not set `allowDraft`.
    #[error("flow version `{0}` is not published")]
    NotPublished(FlowVersionId),

    /// No `Execution` exists for the id the caller supplied.
    #[error("execution `{0}` not found")]
    ExecutionNotFound(ExecutionId),

    /// A `subWorkflow` node's config was missing or malformed.
    #[error("invalid subWorkflow config on node `{0}`: {1}")]
    InvalidSubFlowConfig(flowright_core::NodeId, String),
}
