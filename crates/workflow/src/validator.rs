//! The Graph Validator (C5, §4.5).

use std::collections::{HashMap, HashSet};

use flowright_action::HandlerCategory;
use flowright_core::NodeId;
use flowright_node::NodeRegistry;
use petgraph::algo::{dominators, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use crate::error::{Diagnostic, ValidationError};
use crate::model::{Definition, EdgeType};

/// The reserved node type that closes a `loop` node's body.
///
/// §9 open question: the source has no explicit end-of-loop marker in its
/// handler registry, but §4.5 invariant 6 requires one; this is the
/// resolution recorded in `DESIGN.md` -- `loopEnd` is a reserved
/// `node_type` key rather than its own [`HandlerCategory`].
pub const LOOP_END_NODE_TYPE: &str = "loopEnd";

/// Successful validation's byproduct: nodes unreachable from any trigger.
///
/// Per §4.5 invariant 5, unreachable nodes are not an error -- the Scheduler
/// marks them `skipped` rather than ever attempting to run them.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Non-trigger nodes with no path from any trigger via success edges.
    pub skipped: HashSet<NodeId>,
}

/// Validates a [`Definition`] against the Graph invariants (§3) and the
/// additional checks in §4.5.
pub struct GraphValidator<'a> {
    registry: &'a NodeRegistry,
}

impl<'a> GraphValidator<'a> {
    /// Construct a validator backed by the given registry.
    #[must_use]
    pub fn new(registry: &'a NodeRegistry) -> Self {
        Self { registry }
    }

    /// Run every check, returning the skip set on success.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] carrying every diagnostic found; callers
    /// should surface all of them rather than stopping at the first.
    pub fn validate(&self, def: &Definition) -> Result<ValidationReport, ValidationError> {
        let mut diagnostics = Vec::new();

        self.check_edge_endpoints_exist(def, &mut diagnostics);
        self.check_handler_types_registered(def, &mut diagnostics);
        self.check_config_valid(def, &mut diagnostics);
        self.check_edge_handles_declared(def, &mut diagnostics);

        let (graph, index_of) = build_success_graph(def);
        let triggers = self.trigger_nodes(def);

        self.check_at_least_one_trigger(&triggers, &mut diagnostics);
        self.check_triggers_have_no_inbound_edges(def, &triggers, &mut diagnostics);
        self.check_acyclic(&graph, &mut diagnostics);

        // The skip set is a "will the Scheduler ever invoke this node" check,
        // not a "is this node part of the success-edge DAG" check -- a node
        // reachable only through an Error edge (the error-handler pattern,
        // §4.7 rule 2) is still reachable, so it must not land in `skipped`.
        // Loop-structure and cycle checks above stay success-edge-only: an
        // Error edge never participates in loop dominance.
        let (reach_graph, reach_index_of) = build_reachability_graph(def);
        let reachable = reachable_from(&reach_graph, &reach_index_of, &triggers);
        let skipped = def
            .nodes
            .keys()
            .filter(|id| !triggers.contains(*id) && !reachable.contains(*id))
            .cloned()
            .collect();

        self.check_loop_structure(def, &graph, &index_of, &mut diagnostics);

        if diagnostics.is_empty() {
            Ok(ValidationReport { skipped })
        } else {
            Err(ValidationError::new(diagnostics))
        }
    }

    fn trigger_nodes(&self, def: &Definition) -> HashSet<NodeId> {
        def.nodes
            .values()
            .filter(|n| {
                self.registry
                    .get(&n.node_type)
                    .is_ok_and(|h| h.category() == HandlerCategory::Trigger)
            })
            .map(|n| n.id.clone())
            .collect()
    }

    fn check_edge_endpoints_exist(&self, def: &Definition, out: &mut Vec<Diagnostic>) {
        for edge in &def.edges {
            if !def.nodes.contains_key(&edge.source) {
                out.push(Diagnostic::graph(format!(
                    "edge `{}` references unknown source node `{}`",
                    edge.id, edge.source
                )));
            }
            if !def.nodes.contains_key(&edge.target) {
                out.push(Diagnostic::graph(format!(
                    "edge `{}` references unknown target node `{}`",
                    edge.id, edge.target
                )));
            }
        }
    }

    fn check_handler_types_registered(&self, def: &Definition, out: &mut Vec<Diagnostic>) {
        for node in def.nodes.values() {
            if !self.registry.contains(&node.node_type) {
                out.push(Diagnostic::on_node(
                    node.id.clone(),
                    format!("no handler registered for node type `{}`", node.node_type),
                ));
            }
        }
    }

    fn check_config_valid(&self, def: &Definition, out: &mut Vec<Diagnostic>) {
        for node in def.nodes.values() {
            let Ok(handler) = self.registry.get(&node.node_type) else {
                continue;
            };
            for violation in handler.validate_config(&node.config) {
                out.push(Diagnostic::on_node(
                    node.id.clone(),
                    format!("config.{}: {}", violation.field, violation.message),
                ));
            }
        }
    }

    fn check_edge_handles_declared(&self, def: &Definition, out: &mut Vec<Diagnostic>) {
        for edge in &def.edges {
            if edge.edge_type != EdgeType::Success {
                continue;
            }
            let Some(source_node) = def.nodes.get(&edge.source) else {
                continue;
            };
            let Ok(handler) = self.registry.get(&source_node.node_type) else {
                continue;
            };
            if !handler.interface().declares_handle(edge.handle_name()) {
                out.push(Diagnostic::on_node(
                    edge.source.clone(),
                    format!(
                        "edge `{}` uses undeclared output handle `{}`",
                        edge.id,
                        edge.handle_name()
                    ),
                ));
            }
        }
    }

    fn check_at_least_one_trigger(&self, triggers: &HashSet<NodeId>, out: &mut Vec<Diagnostic>) {
        if triggers.is_empty() {
            out.push(Diagnostic::graph("graph has no trigger node"));
        }
    }

    fn check_triggers_have_no_inbound_edges(
        &self,
        def: &Definition,
        triggers: &HashSet<NodeId>,
        out: &mut Vec<Diagnostic>,
    ) {
        for trigger in triggers {
            if def.inbound_edges(trigger).next().is_some() {
                out.push(Diagnostic::on_node(
                    trigger.clone(),
                    "trigger node has inbound edges",
                ));
            }
        }
    }

    fn check_acyclic(&self, graph: &DiGraph<NodeId, ()>, out: &mut Vec<Diagnostic>) {
        if toposort(graph, None).is_err() {
            out.push(Diagnostic::graph(
                "success-edge subgraph contains a cycle",
            ));
        }
    }

    fn check_loop_structure(
        &self,
        def: &Definition,
        graph: &DiGraph<NodeId, ()>,
        index_of: &HashMap<NodeId, NodeIndex>,
        out: &mut Vec<Diagnostic>,
    ) {
        let loop_nodes: Vec<&NodeId> = def
            .nodes
            .values()
            .filter(|n| {
                self.registry
                    .get(&n.node_type)
                    .is_ok_and(|h| h.category() == HandlerCategory::Loop)
            })
            .map(|n| &n.id)
            .collect();

        let mut bodies: Vec<(NodeId, HashSet<NodeId>)> = Vec::new();

        for loop_id in &loop_nodes {
            let Some(&loop_idx) = index_of.get(*loop_id) else {
                continue;
            };
            let descendants = reachable_set(graph, loop_idx);
            let loop_ends: Vec<&NodeId> = descendants
                .iter()
                .filter(|id| {
                    def.nodes
                        .get(*id)
                        .is_some_and(|n| n.node_type == LOOP_END_NODE_TYPE)
                })
                .collect();

            if loop_ends.len() != 1 {
                out.push(Diagnostic::on_node(
                    (*loop_id).clone(),
                    format!(
                        "loop has {} matching `{LOOP_END_NODE_TYPE}` descendant(s), expected exactly 1",
                        loop_ends.len()
                    ),
                ));
                continue;
            }
            let loop_end_id = loop_ends[0].clone();
            let Some(&loop_end_idx) = index_of.get(&loop_end_id) else {
                continue;
            };

            let doms = dominators::simple_fast(graph, loop_idx);
            let body: HashSet<NodeId> = descendants
                .iter()
                .filter(|id| {
                    **id != loop_end_id && can_reach(graph, index_of[*id], loop_end_idx)
                })
                .cloned()
                .collect();

            for descendant_id in &descendants {
                if *descendant_id == loop_end_id || body.contains(descendant_id) {
                    continue;
                }
                let idx = index_of[descendant_id];
                let dominated = doms
                    .dominators(idx)
                    .is_some_and(|mut chain| chain.any(|d| d == loop_end_idx));
                if !dominated {
                    out.push(Diagnostic::on_node(
                        (*loop_id).clone(),
                        format!(
                            "node `{descendant_id}` is reachable from loop `{loop_id}` \
                             without passing through its `loopEnd` (`{loop_end_id}`)"
                        ),
                    ));
                }
            }

            bodies.push(((*loop_id).clone(), body));
        }

        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let overlap: Vec<&NodeId> = bodies[i].1.intersection(&bodies[j].1).collect();
                if !overlap.is_empty() {
                    out.push(Diagnostic::graph(format!(
                        "loop `{}` and loop `{}` bodies overlap at {:?}",
                        bodies[i].0, bodies[j].0, overlap
                    )));
                }
            }
        }
    }
}

fn build_success_graph(def: &Definition) -> (DiGraph<NodeId, ()>, HashMap<NodeId, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut index_of = HashMap::new();
    for id in def.nodes.keys() {
        let idx = graph.add_node(id.clone());
        index_of.insert(id.clone(), idx);
    }
    for edge in &def.edges {
        if edge.edge_type != EdgeType::Success {
            continue;
        }
        if let (Some(&s), Some(&t)) = (index_of.get(&edge.source), index_of.get(&edge.target)) {
            graph.add_edge(s, t, ());
        }
    }
    (graph, index_of)
}

/// Like [`build_success_graph`], but includes every edge type. Used only for
/// the skip-set reachability check: a node an Error or Always edge leads to
/// is still a node the Scheduler may invoke, even though such edges are
/// excluded from the success-edge DAG the loop/cycle checks reason about.
fn build_reachability_graph(def: &Definition) -> (DiGraph<NodeId, ()>, HashMap<NodeId, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut index_of = HashMap::new();
    for id in def.nodes.keys() {
        let idx = graph.add_node(id.clone());
        index_of.insert(id.clone(), idx);
    }
    for edge in &def.edges {
        if let (Some(&s), Some(&t)) = (index_of.get(&edge.source), index_of.get(&edge.target)) {
            graph.add_edge(s, t, ());
        }
    }
    (graph, index_of)
}

fn reachable_from(
    graph: &DiGraph<NodeId, ()>,
    index_of: &HashMap<NodeId, NodeIndex>,
    roots: &HashSet<NodeId>,
) -> HashSet<NodeId> {
    let mut out = HashSet::new();
    for root in roots {
        let Some(&idx) = index_of.get(root) else {
            continue;
        };
        out.extend(reachable_set(graph, idx));
    }
    out
}

fn reachable_set(graph: &DiGraph<NodeId, ()>, from: NodeIndex) -> HashSet<NodeId> {
    let mut bfs = Bfs::new(graph, from);
    let mut out = HashSet::new();
    while let Some(idx) = bfs.next(graph) {
        if idx != from {
            out.insert(graph[idx].clone());
        }
    }
    out
}

fn can_reach(graph: &DiGraph<NodeId, ()>, from: NodeIndex, to: NodeIndex) -> bool {
    if from == to {
        return true;
    }
    let mut bfs = Bfs::new(graph, from);
    while let Some(idx) = bfs.next(graph) {
        if idx == to {
            return true;
        }
    }
    false
}
