//! GraphBuilder implementation for constructing workflow graphs.
//!
//! This module contains the main GraphBuilder type and its fluent API
//! for declaring nodes and edges before compiling to a [`Workflow`].
//!
//! [`Workflow`]: super::Workflow

use crate::node::NodeSpec;

use super::edges::EdgeSpec;

/// Builder for constructing workflow graphs with a fluent API.
///
/// `GraphBuilder` collects node and edge declarations in order and defers
/// every structural check to [`compile`](Self::compile), so a graph can be
/// assembled incrementally (for example from configuration) without
/// worrying about declaration order. Declaration order is preserved: it
/// breaks priority ties between edges and fixes the order in which node
/// outputs are listed.
///
/// # Examples
///
/// ## Simple Linear Workflow
/// ```
/// use braidflow::graphs::GraphBuilder;
/// use braidflow::node::NodeSpec;
/// use braidflow::types::AgentRole;
///
/// let workflow = GraphBuilder::new()
///     .add_node(NodeSpec::new("planner", AgentRole::Planner))
///     .add_node(NodeSpec::new("writer", AgentRole::Assistant))
///     .add_edge("planner", "writer")
///     .compile()
///     .unwrap();
/// assert_eq!(workflow.node_count(), 2);
/// ```
///
/// ## Fan-out and Join
/// ```
/// use braidflow::graphs::{EdgeSpec, GraphBuilder};
/// use braidflow::node::NodeSpec;
/// use braidflow::transform::{JoinResponses, SplitTags};
/// use braidflow::types::AgentRole;
///
/// let workflow = GraphBuilder::new()
///     .add_node(NodeSpec::new("planner", AgentRole::Planner))
///     .add_node(NodeSpec::new("research", AgentRole::Research))
///     .add_node(NodeSpec::new("summarizer", AgentRole::Summarizer))
///     .add_edge_spec(
///         EdgeSpec::map("planner", "research").with_output_transform(SplitTags::new("question")),
///     )
///     .add_edge_spec(
///         EdgeSpec::reduce("research", "summarizer")
///             .with_output_transform(JoinResponses::default()),
///     )
///     .compile()
///     .unwrap();
/// assert!(workflow.runs_as_branch("research"));
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Node declarations in the order they were added.
    pub nodes: Vec<NodeSpec>,
    /// Edge declarations in the order they were added.
    pub edges: Vec<EdgeSpec>,
}

impl GraphBuilder {
    /// Creates a new, empty graph builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node declaration.
    ///
    /// Duplicate ids are reported by [`compile`](Self::compile), not here.
    #[must_use]
    pub fn add_node(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    /// Connects two nodes with a plain sequential edge.
    ///
    /// Shorthand for `add_edge_spec(EdgeSpec::new(from, to))`; use
    /// [`add_edge_spec`](Self::add_edge_spec) when the edge needs a
    /// pattern, transforms, or a priority.
    #[must_use]
    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_edge_spec(EdgeSpec::new(from, to))
    }

    /// Connects two nodes with a fully configured edge.
    #[must_use]
    pub fn add_edge_spec(mut self, edge: EdgeSpec) -> Self {
        self.edges.push(edge);
        self
    }

    /// Node ids in declaration order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|spec| spec.id.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
