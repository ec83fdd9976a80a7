//! Graph compilation: structural validation and adjacency construction.
//!
//! [`GraphBuilder::compile`] checks the declared topology once, up front,
//! and produces an immutable [`Workflow`] that executors can traverse
//! without re-validating. Runs share a compiled workflow via cheap clones
//! of its `Arc`ed nodes and edges.

use std::collections::VecDeque;
use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::debug;

use crate::node::NodeSpec;
use crate::types::EdgePattern;

use super::builder::GraphBuilder;
use super::edges::EdgeSpec;

/// Structural problems detected while compiling a graph.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum BuildError {
    #[error("graph has no nodes")]
    #[diagnostic(
        code(braidflow::graph::empty),
        help("add at least one node before compiling")
    )]
    EmptyGraph,

    #[error("node id `{id}` is declared more than once")]
    #[diagnostic(code(braidflow::graph::duplicate_node))]
    DuplicateNode { id: String },

    #[error("edge `{edge}` references unknown node `{id}`")]
    #[diagnostic(
        code(braidflow::graph::unknown_node),
        help("declare the node with add_node before connecting it")
    )]
    UnknownNode { edge: String, id: String },

    #[error("graph contains a cycle through `{id}`")]
    #[diagnostic(
        code(braidflow::graph::cycle),
        help("workflows are acyclic; remove one edge of the loop")
    )]
    CycleDetected { id: String },

    #[error("map target `{id}` has {count} incoming edges, expected exactly one")]
    #[diagnostic(
        code(braidflow::graph::fan_in_conflict),
        help("a map target runs once per branch and cannot also be fed by other edges")
    )]
    FanInConflict { id: String, count: usize },

    #[error("node `{id}` would join branch instances with other edges")]
    #[diagnostic(
        code(braidflow::graph::ambiguous_join),
        help("collect branches with a reduce edge before joining them with anything else")
    )]
    AmbiguousJoin { id: String },

    #[error("map edge `{edge}` fans out from branch instances of `{id}`")]
    #[diagnostic(
        code(braidflow::graph::nested_fan_out),
        help("nested fan-out is not supported; reduce the branches first")
    )]
    NestedFanOut { edge: String, id: String },
}

/// An edge plus its compile-time index.
///
/// The index is stable for the lifetime of the [`Workflow`] (it is the
/// edge's position in declaration order) and gives executors a hashable
/// identity for per-edge bookkeeping such as reduce barriers.
#[derive(Clone, Debug)]
pub struct EdgeRef {
    pub id: usize,
    pub spec: Arc<EdgeSpec>,
}

/// A validated, immutable workflow graph.
///
/// Produced by [`GraphBuilder::compile`]. Holds the node registry and
/// adjacency lists with edges sorted by priority (declaration order breaks
/// ties), so runs never need to re-sort or re-check the topology.
#[derive(Clone, Debug)]
pub struct Workflow {
    nodes: FxHashMap<String, Arc<NodeSpec>>,
    node_order: Vec<String>,
    edges: Vec<EdgeRef>,
    outgoing: FxHashMap<String, Vec<EdgeRef>>,
    incoming: FxHashMap<String, Vec<EdgeRef>>,
    branch_nodes: FxHashSet<String>,
}

impl Workflow {
    pub fn node(&self, id: &str) -> Option<&Arc<NodeSpec>> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Node ids in declaration order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.node_order.iter().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All edges in declaration order; `edges()[i].id == i`.
    pub fn edges(&self) -> &[EdgeRef] {
        &self.edges
    }

    /// Outgoing edges of `id`, sorted by priority then declaration order.
    pub fn outgoing(&self, id: &str) -> &[EdgeRef] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Incoming edges of `id`, sorted by priority then declaration order.
    pub fn incoming(&self, id: &str) -> &[EdgeRef] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether `id` executes as per-branch instances of a map fan-out
    /// (either directly as a map target or downstream of one before any
    /// reduce collapses the branches).
    pub fn runs_as_branch(&self, id: &str) -> bool {
        self.branch_nodes.contains(id)
    }
}

impl GraphBuilder {
    /// Validates the declared topology and produces a [`Workflow`].
    ///
    /// Checks, in order: at least one node, unique node ids, edge endpoints
    /// that resolve to declared nodes, map targets with a single incoming
    /// edge, acyclicity, and branch-instance propagation (no nested
    /// fan-out, no joining branch instances without a reduce).
    pub fn compile(self) -> Result<Workflow, BuildError> {
        if self.nodes.is_empty() {
            return Err(BuildError::EmptyGraph);
        }

        let mut nodes: FxHashMap<String, Arc<NodeSpec>> = FxHashMap::default();
        let mut node_order = Vec::with_capacity(self.nodes.len());
        for spec in self.nodes {
            let id = spec.id.clone();
            if nodes.insert(id.clone(), Arc::new(spec)).is_some() {
                return Err(BuildError::DuplicateNode { id });
            }
            node_order.push(id);
        }

        let mut edges = Vec::with_capacity(self.edges.len());
        for (id, spec) in self.edges.into_iter().enumerate() {
            for endpoint in [spec.from(), spec.to()] {
                if !nodes.contains_key(endpoint) {
                    return Err(BuildError::UnknownNode {
                        edge: spec.label(),
                        id: endpoint.to_string(),
                    });
                }
            }
            edges.push(EdgeRef {
                id,
                spec: Arc::new(spec),
            });
        }

        let mut outgoing: FxHashMap<String, Vec<EdgeRef>> = FxHashMap::default();
        let mut incoming: FxHashMap<String, Vec<EdgeRef>> = FxHashMap::default();
        for edge in &edges {
            outgoing
                .entry(edge.spec.from().to_string())
                .or_default()
                .push(edge.clone());
            incoming
                .entry(edge.spec.to().to_string())
                .or_default()
                .push(edge.clone());
        }
        for list in outgoing.values_mut().chain(incoming.values_mut()) {
            list.sort_by_key(|edge| (edge.spec.priority(), edge.id));
        }

        for edge in &edges {
            if edge.spec.pattern() == EdgePattern::Map {
                let count = incoming.get(edge.spec.to()).map_or(0, Vec::len);
                if count > 1 {
                    return Err(BuildError::FanInConflict {
                        id: edge.spec.to().to_string(),
                        count,
                    });
                }
            }
        }

        if let Some(id) = detect_cycle(&node_order, &outgoing) {
            return Err(BuildError::CycleDetected { id });
        }

        let branch_nodes = propagate_branches(&edges, &outgoing, &incoming)?;

        debug!(
            nodes = node_order.len(),
            edges = edges.len(),
            "compiled workflow"
        );

        Ok(Workflow {
            nodes,
            node_order,
            edges,
            outgoing,
            incoming,
            branch_nodes,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Depth-first cycle search. Returns a node on the first cycle found.
fn detect_cycle(order: &[String], outgoing: &FxHashMap<String, Vec<EdgeRef>>) -> Option<String> {
    fn visit<'a>(
        node: &'a str,
        outgoing: &'a FxHashMap<String, Vec<EdgeRef>>,
        marks: &mut FxHashMap<&'a str, Mark>,
    ) -> Option<String> {
        match marks.get(node) {
            Some(Mark::Done) => return None,
            Some(Mark::InProgress) => return Some(node.to_string()),
            None => {}
        }
        marks.insert(node, Mark::InProgress);
        if let Some(edges) = outgoing.get(node) {
            for edge in edges {
                if let Some(found) = visit(edge.spec.to(), outgoing, marks) {
                    return Some(found);
                }
            }
        }
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks: FxHashMap<&str, Mark> = FxHashMap::default();
    for node in order {
        if let Some(found) = visit(node, outgoing, &mut marks) {
            return Some(found);
        }
    }
    None
}

/// Marks every node that executes as branch instances: map targets, plus
/// anything they feed through sequential edges until a reduce edge
/// collapses the branches. Rejects topologies the scheduler cannot key
/// unambiguously.
fn propagate_branches(
    edges: &[EdgeRef],
    outgoing: &FxHashMap<String, Vec<EdgeRef>>,
    incoming: &FxHashMap<String, Vec<EdgeRef>>,
) -> Result<FxHashSet<String>, BuildError> {
    let mut branch_nodes: FxHashSet<String> = FxHashSet::default();
    let mut queue: VecDeque<String> = edges
        .iter()
        .filter(|edge| edge.spec.pattern() == EdgePattern::Map)
        .map(|edge| edge.spec.to().to_string())
        .collect();

    while let Some(node) = queue.pop_front() {
        if !branch_nodes.insert(node.clone()) {
            continue;
        }
        if let Some(out) = outgoing.get(&node) {
            for edge in out {
                match edge.spec.pattern() {
                    EdgePattern::Sequential => {
                        let to = edge.spec.to();
                        if incoming.get(to).map_or(0, Vec::len) > 1 {
                            return Err(BuildError::AmbiguousJoin { id: to.to_string() });
                        }
                        queue.push_back(to.to_string());
                    }
                    EdgePattern::Map => {
                        return Err(BuildError::NestedFanOut {
                            edge: edge.spec.label(),
                            id: node,
                        });
                    }
                    // A reduce edge collapses the branches; its target runs once.
                    EdgePattern::Reduce => {}
                }
            }
        }
    }
    Ok(branch_nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentRole;

    fn node(id: &str) -> NodeSpec {
        NodeSpec::new(id, AgentRole::Assistant)
    }

    #[test]
    fn empty_graph_is_rejected() {
        let err = GraphBuilder::new().compile().unwrap_err();
        assert!(matches!(err, BuildError::EmptyGraph));
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let err = GraphBuilder::new()
            .add_node(node("a"))
            .add_node(node("a"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateNode { id } if id == "a"));
    }

    #[test]
    fn edges_must_reference_declared_nodes() {
        let err = GraphBuilder::new()
            .add_node(node("a"))
            .add_edge("a", "ghost")
            .compile()
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownNode { id, .. } if id == "ghost"));
    }

    #[test]
    fn cycles_are_rejected() {
        let err = GraphBuilder::new()
            .add_node(node("a"))
            .add_node(node("b"))
            .add_node(node("c"))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .add_edge("c", "a")
            .compile()
            .unwrap_err();
        assert!(matches!(err, BuildError::CycleDetected { .. }));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let err = GraphBuilder::new()
            .add_node(node("a"))
            .add_edge("a", "a")
            .compile()
            .unwrap_err();
        assert!(matches!(err, BuildError::CycleDetected { id } if id == "a"));
    }

    #[test]
    fn map_target_cannot_have_other_incoming_edges() {
        let err = GraphBuilder::new()
            .add_node(node("planner"))
            .add_node(node("other"))
            .add_node(node("worker"))
            .add_edge_spec(EdgeSpec::map("planner", "worker"))
            .add_edge("other", "worker")
            .compile()
            .unwrap_err();
        assert!(matches!(err, BuildError::FanInConflict { id, count: 2 } if id == "worker"));
    }

    #[test]
    fn branch_instances_cannot_join_without_reduce() {
        let err = GraphBuilder::new()
            .add_node(node("planner"))
            .add_node(node("worker"))
            .add_node(node("other"))
            .add_node(node("join"))
            .add_edge_spec(EdgeSpec::map("planner", "worker"))
            .add_edge("worker", "join")
            .add_edge("other", "join")
            .compile()
            .unwrap_err();
        assert!(matches!(err, BuildError::AmbiguousJoin { id } if id == "join"));
    }

    #[test]
    fn nested_fan_out_is_rejected() {
        let err = GraphBuilder::new()
            .add_node(node("planner"))
            .add_node(node("worker"))
            .add_node(node("inner"))
            .add_edge_spec(EdgeSpec::map("planner", "worker"))
            .add_edge_spec(EdgeSpec::map("worker", "inner"))
            .compile()
            .unwrap_err();
        assert!(matches!(err, BuildError::NestedFanOut { id, .. } if id == "worker"));
    }

    #[test]
    fn branch_membership_stops_at_reduce() {
        let workflow = GraphBuilder::new()
            .add_node(node("planner"))
            .add_node(node("worker"))
            .add_node(node("refiner"))
            .add_node(node("summarizer"))
            .add_edge_spec(EdgeSpec::map("planner", "worker"))
            .add_edge("worker", "refiner")
            .add_edge_spec(EdgeSpec::reduce("refiner", "summarizer"))
            .compile()
            .unwrap();
        assert!(workflow.runs_as_branch("worker"));
        assert!(workflow.runs_as_branch("refiner"));
        assert!(!workflow.runs_as_branch("summarizer"));
        assert!(!workflow.runs_as_branch("planner"));
    }

    #[test]
    fn reduce_from_unfanned_node_compiles() {
        let workflow = GraphBuilder::new()
            .add_node(node("solo"))
            .add_node(node("collector"))
            .add_edge_spec(EdgeSpec::reduce("solo", "collector"))
            .compile()
            .unwrap();
        assert!(!workflow.runs_as_branch("solo"));
        assert_eq!(workflow.incoming("collector").len(), 1);
    }

    #[test]
    fn adjacency_is_sorted_by_priority_then_declaration() {
        let workflow = GraphBuilder::new()
            .add_node(node("a"))
            .add_node(node("b"))
            .add_node(node("c"))
            .add_node(node("join"))
            .add_edge_spec(EdgeSpec::new("a", "join").with_priority(5))
            .add_edge_spec(EdgeSpec::new("b", "join").with_priority(1))
            .add_edge_spec(EdgeSpec::new("c", "join").with_priority(1))
            .compile()
            .unwrap();
        let incoming: Vec<&str> = workflow
            .incoming("join")
            .iter()
            .map(|edge| edge.spec.from())
            .collect();
        assert_eq!(incoming, vec!["b", "c", "a"]);
    }

    #[test]
    fn edge_ids_match_declaration_order() {
        let workflow = GraphBuilder::new()
            .add_node(node("a"))
            .add_node(node("b"))
            .add_node(node("c"))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .compile()
            .unwrap();
        for (index, edge) in workflow.edges().iter().enumerate() {
            assert_eq!(edge.id, index);
        }
        assert_eq!(workflow.edge_count(), 2);
    }
}
