//! # Braidflow: Multi-Agent Workflow Orchestration
//!
//! Braidflow runs directed acyclic graphs of LLM agents. Each node is an
//! agent with a role, a system prompt, and optional tool access; edges carry
//! payloads between nodes, optionally rewritten by transforms. Map edges fan
//! one output into parallel branch instances, reduce edges gather the
//! branches back into a single aggregation, and every run reports progress
//! as an ordered stream of events ending in exactly one terminal event.
//!
//! ## Core Concepts
//!
//! - **Nodes**: agent definitions ([`node::NodeSpec`]) with role, prompt,
//!   tools, and history handling
//! - **Edges**: sequential, map, and reduce connections with optional
//!   payload [`transform`]s
//! - **Workflow**: a structurally validated graph compiled by
//!   [`graphs::GraphBuilder`]
//! - **Executor**: concurrent dispatch with reduce barriers and a
//!   configurable failure policy
//! - **Events**: live streams and pluggable sinks, fanned out by the
//!   [`event_bus`]
//! - **Tools**: JSON-RPC tool servers discovered and invoked through
//!   [`tools::ToolBridge`]
//!
//! ## Quick Start
//!
//! ### Working with Messages
//!
//! Messages are the conversation primitive handed to models:
//!
//! ```
//! use braidflow::message::Message;
//!
//! let user_msg = Message::user("What's the capital of Norway?");
//! let assistant_msg = Message::assistant("Oslo.");
//! let system_msg = Message::system("Answer in one word.");
//!
//! // Custom roles use the general constructor
//! let critic_msg = Message::new("critic", "Too terse.");
//!
//! assert!(user_msg.has_role(Message::USER));
//! assert!(!user_msg.has_role(Message::ASSISTANT));
//! ```
//!
//! ### Declaring and Compiling a Workflow
//!
//! ```
//! use braidflow::graphs::{EdgeSpec, GraphBuilder};
//! use braidflow::node::NodeSpec;
//! use braidflow::transform::{JoinResponses, SplitTags};
//! use braidflow::types::AgentRole;
//!
//! // One research branch per <question> the planner emits.
//! let workflow = GraphBuilder::new()
//!     .add_node(NodeSpec::new("planner", AgentRole::Planner))
//!     .add_node(NodeSpec::new("research", AgentRole::Research))
//!     .add_node(NodeSpec::new("summarizer", AgentRole::Summarizer).with_return_output(true))
//!     .add_edge_spec(
//!         EdgeSpec::map("planner", "research").with_output_transform(SplitTags::new("question")),
//!     )
//!     .add_edge_spec(
//!         EdgeSpec::reduce("research", "summarizer")
//!             .with_output_transform(JoinResponses::new("\n\n")),
//!     )
//!     .compile()
//!     .expect("valid graph");
//!
//! assert!(workflow.runs_as_branch("research"));
//! ```
//!
//! ### Running
//!
//! Execution needs a [`llm::ModelClient`]; anything that streams
//! [`llm::ModelChunk`]s works, from a provider adapter to a scripted test
//! double:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use braidflow::context::ThreadContext;
//! use braidflow::executor::{GraphExecutor, NodeExecutor};
//! use braidflow::graphs::GraphBuilder;
//! use braidflow::llm::{ModelChunk, ModelClient, ModelError, ModelRequest, ModelStream};
//! use braidflow::node::NodeSpec;
//! use braidflow::types::AgentRole;
//! use futures_util::StreamExt;
//!
//! struct EchoModel;
//!
//! #[async_trait]
//! impl ModelClient for EchoModel {
//!     async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError> {
//!         let text = request
//!             .messages
//!             .last()
//!             .map(|message| message.content.clone())
//!             .unwrap_or_default();
//!         let chunks = [Ok(ModelChunk::Text(text)), Ok(ModelChunk::Done)];
//!         Ok(futures_util::stream::iter(chunks).boxed())
//!     }
//! }
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let workflow = GraphBuilder::new()
//!     .add_node(NodeSpec::new("draft", AgentRole::Assistant))
//!     .add_node(NodeSpec::new("polish", AgentRole::Assistant).with_return_output(true))
//!     .add_edge("draft", "polish")
//!     .compile()?;
//!
//! let executor = GraphExecutor::new(workflow, NodeExecutor::new(Arc::new(EchoModel)));
//! let result = executor
//!     .execute(
//!         "draft",
//!         "Write a haiku about rivers.".into(),
//!         ThreadContext::new("thread-1", "item-1"),
//!     )
//!     .await?;
//! println!("{}", result.output);
//! # Ok(())
//! # }
//! ```
//!
//! For live progress, [`executor::GraphExecutor::execute_streaming`] returns
//! the event stream alongside a [`executor::RunHandle`] that can cancel the
//! run mid-flight.
//!
//! ## Module Guide
//!
//! - [`message`] - Conversation messages and role constants
//! - [`types`] - Roles, edge patterns, statuses, and tool call/result types
//! - [`node`] - Agent node definitions
//! - [`graphs`] - Workflow declaration and compilation
//! - [`transform`] - Edge payload rewrites and the built-in transforms
//! - [`context`] - Thread context, per-run ledger, and node records
//! - [`llm`] - The model client seam and its request/chunk types
//! - [`tools`] - Tool servers, discovery, and the transport seam
//! - [`executor`] - Graph and node execution, policies, run handles
//! - [`event_bus`] - Event fan-out, sinks, and subscriber streams
//! - [`telemetry`] - Tracing setup for binaries and tests

pub mod context;
pub mod event_bus;
pub mod executor;
pub mod graphs;
pub mod llm;
pub mod message;
pub mod node;
pub mod telemetry;
pub mod tools;
pub mod transform;
pub mod types;
