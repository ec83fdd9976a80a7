//! Graph definition and compilation for workflow execution.
//!
//! This module provides the core graph building functionality for creating
//! workflow graphs with nodes, edges, and routing patterns. The main entry
//! point is [`GraphBuilder`], which uses a builder pattern to construct
//! workflows that compile into immutable [`Workflow`] values ready for an
//! executor.
//!
//! # Core Concepts
//!
//! - **Nodes**: Agent declarations described by [`NodeSpec`](crate::node::NodeSpec)
//! - **Edges**: Connections between nodes with a [`pattern`](crate::types::EdgePattern)
//!   (sequential, map, or reduce), optional payload transforms, and a priority
//! - **Compilation**: Structural validation and conversion to a [`Workflow`]
//!
//! # Quick Start
//!
//! ```
//! use braidflow::graphs::{EdgeSpec, GraphBuilder};
//! use braidflow::node::NodeSpec;
//! use braidflow::transform::{JoinResponses, SplitTags};
//! use braidflow::types::AgentRole;
//!
//! // planner fans out questions, research answers each one in parallel,
//! // summarizer joins the answers.
//! let workflow = GraphBuilder::new()
//!     .add_node(NodeSpec::new("planner", AgentRole::Planner))
//!     .add_node(NodeSpec::new("research", AgentRole::Research))
//!     .add_node(NodeSpec::new("summarizer", AgentRole::Summarizer).with_return_output(true))
//!     .add_edge_spec(
//!         EdgeSpec::map("planner", "research").with_output_transform(SplitTags::new("question")),
//!     )
//!     .add_edge_spec(
//!         EdgeSpec::reduce("research", "summarizer")
//!             .with_output_transform(JoinResponses::default()),
//!     )
//!     .compile()
//!     .unwrap();
//!
//! assert_eq!(workflow.node_count(), 3);
//! assert!(workflow.runs_as_branch("research"));
//! ```

mod builder;
mod compilation;
mod edges;

pub use builder::GraphBuilder;
pub use compilation::{BuildError, EdgeRef, Workflow};
pub use edges::EdgeSpec;
