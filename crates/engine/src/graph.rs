//! Structural facts about a `Definition` precomputed once per Execution:
//! edge classification, initial dependency counts, a topological order, and
//! the `loop` → `loopEnd` / loop-body mapping the Scheduler needs to drive
//! iteration (§4.6 "Loop semantics").
//!
//! The `GraphValidator` (C5) has already rejected malformed graphs by the
//! time this runs, so the matching logic here assumes a well-formed,
//! single-matching-`loopEnd`-per-loop graph rather than re-deriving the
//! dominance proof.

use std::collections::{HashMap, HashSet};

use flowright_action::HandlerCategory;
use flowright_core::NodeId;
use flowright_node::NodeRegistry;
use flowright_workflow::{Definition, EdgeType, LOOP_END_NODE_TYPE};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

/// Precomputed structural view of one `Definition`, shared read-only across
/// an Execution's lifetime.
pub struct GraphIndex {
    categories: HashMap<NodeId, HandlerCategory>,
    node_types: HashMap<NodeId, String>,
    /// Inbound edge count participating in readiness (success + always; not error).
    initial_pending: HashMap<NodeId, usize>,
    /// Nodes in an order consistent with the success-edge DAG.
    topo_order: Vec<NodeId>,
    loop_end_of: HashMap<NodeId, NodeId>,
    body_of: HashMap<NodeId, HashSet<NodeId>>,
}

impl GraphIndex {
    /// Build the index. `registry` supplies each node's `HandlerCategory`.
    ///
    /// # Panics
    ///
    /// Panics if `def` contains a node type absent from `registry`, or a
    /// cycle in its success-edge subgraph -- both are rejected by
    /// `GraphValidator::validate` before an Execution is ever scheduled.
    #[must_use]
    pub fn build(def: &Definition, registry: &NodeRegistry) -> Self {
        let categories: HashMap<NodeId, HandlerCategory> = def
            .nodes
            .values()
            .map(|n| {
                let category = registry
                    .get(&n.node_type)
                    .unwrap_or_else(|e| panic!("unregistered node type in validated graph: {e}"))
                    .category();
                (n.id.clone(), category)
            })
            .collect();

        let node_types: HashMap<NodeId, String> = def
            .nodes
            .values()
            .map(|n| (n.id.clone(), n.node_type.clone()))
            .collect();

        let mut initial_pending: HashMap<NodeId, usize> =
            def.nodes.keys().map(|id| (id.clone(), 0)).collect();
        for edge in &def.edges {
            if matches!(edge.edge_type, EdgeType::Success | EdgeType::Always) {
                *initial_pending.entry(edge.target.clone()).or_insert(0) += 1;
            }
        }

        let mut graph = DiGraph::<NodeId, ()>::new();
        let mut index_of: HashMap<NodeId, NodeIndex> = HashMap::new();
        for id in def.nodes.keys() {
            index_of.insert(id.clone(), graph.add_node(id.clone()));
        }
        for edge in &def.edges {
            if edge.edge_type == EdgeType::Success {
                graph.add_edge(index_of[&edge.source], index_of[&edge.target], ());
            }
        }
        let order = toposort(&graph, None).expect("success-edge subgraph must be acyclic");
        let topo_order: Vec<NodeId> = order.into_iter().map(|idx| graph[idx].clone()).collect();

        let (loop_end_of, body_of) = match_loops(&topo_order, &categories, &node_types);

        Self {
            categories,
            node_types,
            initial_pending,
            topo_order,
            loop_end_of,
            body_of,
        }
    }

    #[must_use]
    pub fn node_type(&self, node_id: &NodeId) -> &str {
        &self.node_types[node_id]
    }

    #[must_use]
    pub fn category(&self, node_id: &NodeId) -> HandlerCategory {
        self.categories[node_id]
    }

    #[must_use]
    pub fn initial_pending(&self, node_id: &NodeId) -> usize {
        self.initial_pending.get(node_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn topo_order(&self) -> &[NodeId] {
        &self.topo_order
    }

    #[must_use]
    pub fn loop_end_of(&self, loop_id: &NodeId) -> Option<&NodeId> {
        self.loop_end_of.get(loop_id)
    }

    #[must_use]
    pub fn body_of(&self, loop_id: &NodeId) -> Option<&HashSet<NodeId>> {
        self.body_of.get(loop_id)
    }
}

/// Match each `Loop`-category node to its `loopEnd` and body, using
/// balanced-bracket nesting over the topological order: entering another
/// loop increments depth, a `loopEnd` decrements it, and the `loopEnd` that
/// brings a loop's own depth back to zero is its match.
fn match_loops(
    topo_order: &[NodeId],
    categories: &HashMap<NodeId, HandlerCategory>,
    node_types: &HashMap<NodeId, String>,
) -> (HashMap<NodeId, NodeId>, HashMap<NodeId, HashSet<NodeId>>) {
    let mut loop_end_of = HashMap::new();
    let mut body_of = HashMap::new();

    for (start_idx, loop_id) in topo_order.iter().enumerate() {
        if categories.get(loop_id) != Some(&HandlerCategory::Loop) {
            continue;
        }
        let mut depth = 1i32;
        let mut body = HashSet::new();
        for candidate in &topo_order[start_idx + 1..] {
            if categories.get(candidate) == Some(&HandlerCategory::Loop) {
                depth += 1;
            } else if node_types.get(candidate).map(String::as_str) == Some(LOOP_END_NODE_TYPE) {
                depth -= 1;
                if depth == 0 {
                    loop_end_of.insert(loop_id.clone(), candidate.clone());
                    break;
                }
            }
            if depth > 0 {
                body.insert(candidate.clone());
            }
        }
        body_of.insert(loop_id.clone(), body);
    }

    (loop_end_of, body_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowright_action::{HandlerMetadata, NodeContext, NodeExecutionResult, NodeHandler};
    use flowright_workflow::{Definition, Edge, Node};
    use std::sync::Arc;

    struct StubHandler {
        metadata: HandlerMetadata,
    }

    impl StubHandler {
        fn new(node_type: &str, category: HandlerCategory) -> Self {
            Self {
                metadata: HandlerMetadata::new(node_type, node_type, category, "stub"),
            }
        }
    }

    #[async_trait]
    impl NodeHandler for StubHandler {
        fn metadata(&self) -> &HandlerMetadata {
            &self.metadata
        }

        async fn execute(&self, ctx: NodeContext) -> NodeExecutionResult {
            NodeExecutionResult::success(ctx.input)
        }
    }

    fn registry() -> NodeRegistry {
        let mut reg = NodeRegistry::new();
        reg.register(Arc::new(StubHandler::new("trigger", HandlerCategory::Trigger)))
            .unwrap();
        reg.register(Arc::new(StubHandler::new("setFields", HandlerCategory::Transform)))
            .unwrap();
        reg.register(Arc::new(StubHandler::new("loop", HandlerCategory::Loop)))
            .unwrap();
        reg.register(Arc::new(StubHandler::new(
            LOOP_END_NODE_TYPE,
            HandlerCategory::Transform,
        )))
        .unwrap();
        reg
    }

    fn linear_def() -> Definition {
        Definition::empty()
            .with_node(Node::new("a", "trigger", "A"))
            .with_node(Node::new("b", "setFields", "B"))
            .with_edge(Edge::main("a", "b"))
    }

    #[test]
    fn initial_pending_counts_success_and_always_only() {
        let mut def = linear_def();
        def = def.with_node(Node::new("c", "setFields", "C"));
        def.edges.push(Edge {
            id: "a:error->c".into(),
            source: "a".into(),
            source_handle: Some("error".into()),
            target: "c".into(),
            edge_type: EdgeType::Error,
        });
        let reg = registry();
        let idx = GraphIndex::build(&def, &reg);
        assert_eq!(idx.initial_pending(&"a".into()), 0);
        assert_eq!(idx.initial_pending(&"b".into()), 1);
        assert_eq!(idx.initial_pending(&"c".into()), 0);
    }

    #[test]
    fn topo_order_respects_dependencies() {
        let def = linear_def();
        let reg = registry();
        let idx = GraphIndex::build(&def, &reg);
        let pos_a = idx.topo_order().iter().position(|n| n == &NodeId::from("a")).unwrap();
        let pos_b = idx.topo_order().iter().position(|n| n == &NodeId::from("b")).unwrap();
        assert!(pos_a < pos_b);
    }

    #[test]
    fn category_lookup_matches_registry() {
        let def = linear_def();
        let reg = registry();
        let idx = GraphIndex::build(&def, &reg);
        assert_eq!(idx.category(&"a".into()), HandlerCategory::Trigger);
        assert_eq!(idx.category(&"b".into()), HandlerCategory::Transform);
    }

    #[test]
    fn loop_matches_its_loop_end_and_body() {
        let def = Definition::empty()
            .with_node(Node::new("trig", "trigger", "Trigger"))
            .with_node(Node::new("lp", "loop", "Loop"))
            .with_node(Node::new("body1", "setFields", "Body"))
            .with_node(Node::new("end", LOOP_END_NODE_TYPE, "LoopEnd"))
            .with_node(Node::new("after", "setFields", "After"))
            .with_edge(Edge::main("trig", "lp"))
            .with_edge(Edge::main("lp", "body1"))
            .with_edge(Edge::main("body1", "end"))
            .with_edge(Edge::main("end", "after"));
        let reg = registry();
        let idx = GraphIndex::build(&def, &reg);

        assert_eq!(idx.loop_end_of(&"lp".into()), Some(&NodeId::from("end")));
        let body = idx.body_of(&"lp".into()).unwrap();
        assert!(body.contains(&NodeId::from("body1")));
        assert!(!body.contains(&NodeId::from("end")));
        assert!(!body.contains(&NodeId::from("after")));
    }

    #[test]
    fn nested_loops_match_inner_before_outer() {
        let def = Definition::empty()
            .with_node(Node::new("outer", "loop", "Outer"))
            .with_node(Node::new("inner", "loop", "Inner"))
            .with_node(Node::new("inner_body", "setFields", "InnerBody"))
            .with_node(Node::new("inner_end", LOOP_END_NODE_TYPE, "InnerEnd"))
            .with_node(Node::new("outer_end", LOOP_END_NODE_TYPE, "OuterEnd"))
            .with_edge(Edge::main("outer", "inner"))
            .with_edge(Edge::main("inner", "inner_body"))
            .with_edge(Edge::main("inner_body", "inner_end"))
            .with_edge(Edge::main("inner_end", "outer_end"));
        let reg = registry();
        let idx = GraphIndex::build(&def, &reg);

        assert_eq!(idx.loop_end_of(&"inner".into()), Some(&NodeId::from("inner_end")));
        assert_eq!(idx.loop_end_of(&"outer".into()), Some(&NodeId::from("outer_end")));
        let outer_body = idx.body_of(&"outer".into()).unwrap();
        assert!(outer_body.contains(&NodeId::from("inner")));
        assert!(outer_body.contains(&NodeId::from("inner_body")));
        assert!(outer_body.contains(&NodeId::from("inner_end")));
    }
}
