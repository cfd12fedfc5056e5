//! The Flow / FlowVersion / Graph data model (§3).

use chrono::{DateTime, Utc};
use flowright_core::{FlowId, FlowVersionId, JsonMap, NodeId, UserId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user-owned workflow aggregate. Owns zero or more [`FlowVersion`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Unique identifier.
    pub id: FlowId,
    /// Owning user.
    pub owner: UserId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: String,
    /// Soft-delete marker; a deleted Flow's versions may still be read for history.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Flow {
    /// Create a new, non-deleted flow.
    pub fn new(owner: UserId, name: impl Into<String>) -> Self {
        Self {
            id: FlowId::new(),
            owner,
            name: name.into(),
            description: String::new(),
            deleted_at: None,
        }
    }
}

/// Lifecycle stage of a [`FlowVersion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowVersionStatus {
    /// Still editable; its `definition` may change.
    Draft,
    /// Frozen; `definition` is immutable from this point on (§3 invariant).
    Published,
    /// Retired; no new Executions may start against it.
    Archived,
}

/// Per-version tunables (§3: "settings (map of knobs: defaultTimeoutMs,
/// defaultRetryPolicy, maxConcurrentNodes)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSettings {
    /// Default per-node wall-clock timeout, applied when a node declares none.
    pub default_timeout_ms: Option<u64>,
    /// Default retry policy, applied when a node declares none.
    pub default_retry_policy: Option<crate::retry::RetryPolicy>,
    /// Worker pool capacity for Executions of this version (§4.6 default 8).
    pub max_concurrent_nodes: u32,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            default_retry_policy: None,
            max_concurrent_nodes: 8,
        }
    }
}

/// An immutable (once published) snapshot of a Flow's graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowVersion {
    /// Unique identifier.
    pub id: FlowVersionId,
    /// The owning Flow.
    pub flow_id: FlowId,
    /// Author-chosen label (e.g. `"v3"`).
    pub label: String,
    /// Lifecycle stage.
    pub status: FlowVersionStatus,
    /// The executable graph.
    pub definition: Definition,
    /// Execution tunables.
    pub settings: FlowSettings,
}

impl FlowVersion {
    /// Construct a new draft version.
    pub fn draft(flow_id: FlowId, label: impl Into<String>, definition: Definition) -> Self {
        Self {
            id: FlowVersionId::new(),
            flow_id,
            label: label.into(),
            status: FlowVersionStatus::Draft,
            definition,
            settings: FlowSettings::default(),
        }
    }

    /// Whether Executions may start against this version without `allowDraft`.
    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self.status, FlowVersionStatus::Published)
    }
}

/// A single node in a [`Definition`] (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique within the graph; author-assigned.
    pub id: NodeId,
    /// Key into the `NodeHandler` registry.
    pub node_type: String,
    /// Display label shown in the editor.
    pub label: String,
    /// Handler config, possibly containing `{{ }}` expression templates.
    pub config: JsonMap,
    /// Layout-only position; never interpreted by the engine.
    pub position: (f64, f64),
}

impl Node {
    /// Construct a node with empty config and a default position.
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: label.into(),
            config: JsonMap::new(),
            position: (0.0, 0.0),
        }
    }

    /// Attach config, returning `self` for chaining.
    #[must_use]
    pub fn with_config(mut self, config: JsonMap) -> Self {
        self.config = config;
        self
    }
}

/// The kind of dependency an [`Edge`] expresses (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Normal data-flow edge; participates in the success-dependency DAG.
    Success,
    /// Armed only when the source node fails (§4.7).
    Error,
    /// Satisfied on any terminal state of the source, success or failure.
    Always,
}

/// A directed connection between two nodes' handles (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Unique id within the graph, derived deterministically if not set explicitly.
    pub id: String,
    /// The upstream node.
    pub source: NodeId,
    /// Which of the source's declared output handles this edge leaves from.
    /// `None` means the default `"main"` handle.
    pub source_handle: Option<String>,
    /// The downstream node.
    pub target: NodeId,
    /// The edge's participation in readiness/failure semantics.
    pub edge_type: EdgeType,
}

impl Edge {
    /// Construct a `success`-typed edge leaving the source's `"main"` handle.
    pub fn main(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            source_handle: None,
            target,
            edge_type: EdgeType::Success,
        }
    }

    /// Construct a `success`-typed edge leaving a named handle (e.g. `"true"`).
    pub fn handle(source: impl Into<NodeId>, source_handle: impl Into<String>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        let handle = source_handle.into();
        Self {
            id: format!("{source}:{handle}->{target}"),
            source,
            source_handle: Some(handle),
            target,
            edge_type: EdgeType::Success,
        }
    }

    /// Construct an `error`-typed edge.
    pub fn error(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}:error->{target}"),
            source,
            source_handle: Some("error".to_owned()),
            target,
            edge_type: EdgeType::Error,
        }
    }

    /// The effective handle name, defaulting `None` to `"main"`.
    #[must_use]
    pub fn handle_name(&self) -> &str {
        self.source_handle.as_deref().unwrap_or("main")
    }
}

/// The executable artifact of a [`FlowVersion`] (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definition {
    /// All nodes, keyed by id; insertion order is preserved for stable tie-breaks.
    pub nodes: IndexMap<NodeId, Node>,
    /// All edges, in declaration order.
    pub edges: Vec<Edge>,
}

impl Definition {
    /// An empty graph.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a node, returning `self` for chaining.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    /// Add an edge, returning `self` for chaining.
    #[must_use]
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Edges leaving `node_id`.
    pub fn outbound_edges<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| &e.source == node_id)
    }

    /// Edges entering `node_id`.
    pub fn inbound_edges<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| &e.target == node_id)
    }
}

/// Designer-supplied stand-in output for a node, keyed by `(flowVersionId, nodeId)`.
///
/// When present, the Scheduler skips invoking the handler entirely (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnedData {
    /// The version this pin applies to.
    pub flow_version_id: FlowVersionId,
    /// The pinned node.
    pub node_id: NodeId,
    /// The stand-in output, used verbatim as the synthetic NodeRun's output.
    pub output: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_main_defaults_to_main_handle() {
        let e = Edge::main("a", "b");
        assert_eq!(e.handle_name(), "main");
        assert_eq!(e.edge_type, EdgeType::Success);
    }

    #[test]
    fn edge_handle_sets_named_handle() {
        let e = Edge::handle("cond", "true", "a");
        assert_eq!(e.handle_name(), "true");
    }

    #[test]
    fn definition_builder_tracks_nodes_and_edges() {
        let def = Definition::empty()
            .with_node(Node::new("trigger", "webhook.trigger", "Trigger"))
            .with_node(Node::new("a", "noop", "A"))
            .with_edge(Edge::main("trigger", "a"));
        assert_eq!(def.nodes.len(), 2);
        assert_eq!(def.edges.len(), 1);
        assert_eq!(
            def.outbound_edges(&NodeId::new("trigger")).count(),
            1
        );
        assert_eq!(def.inbound_edges(&NodeId::new("a")).count(), 1);
    }

    #[test]
    fn flow_version_published_gate() {
        let def = Definition::empty();
        let mut v = FlowVersion::draft(FlowId::new(), "v1", def);
        assert!(!v.is_published());
        v.status = FlowVersionStatus::Published;
        assert!(v.is_published());
    }
}
