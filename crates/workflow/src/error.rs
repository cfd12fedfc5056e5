//! Graph validation errors (§4.5).

use flowright_core::NodeId;
use thiserror::Error;

/// One per-node validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The offending node, if the failure is node-scoped.
    pub node_id: Option<NodeId>,
    /// Human-readable explanation.
    pub message: String,
}

impl Diagnostic {
    /// A diagnostic scoped to a specific node.
    pub fn on_node(node_id: NodeId, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id),
            message: message.into(),
        }
    }

    /// A diagnostic scoped to the graph as a whole.
    pub fn graph(message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            message: message.into(),
        }
    }
}

/// A graph failed validation (§4.5: "no Execution row transitions past `pending`").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("graph validation failed with {} diagnostic(s)", .0.len())]
pub struct ValidationError(pub Vec<Diagnostic>);

impl ValidationError {
    /// Construct from a non-empty diagnostic list.
    #[must_use]
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self(diagnostics)
    }
}
