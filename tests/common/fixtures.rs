//! Workflow fixtures shared across the executor tests.

use std::sync::Arc;

use braidflow::context::ThreadContext;
use braidflow::event_bus::{EventStream, GraphEvent};
use braidflow::executor::{EventBusConfig, ExecutorConfig, GraphExecutor, NodeExecutor};
use braidflow::graphs::{EdgeSpec, GraphBuilder, Workflow};
use braidflow::llm::ModelClient;
use braidflow::node::NodeSpec;
use braidflow::transform::{JoinResponses, SplitTags};
use braidflow::types::AgentRole;
use futures_util::StreamExt;

/// `planner --map--> research --reduce--> summarizer`, the shape most
/// multi-agent runs take.
pub fn fan_out_workflow() -> Workflow {
    GraphBuilder::new()
        .add_node(NodeSpec::new("planner", AgentRole::Planner))
        .add_node(NodeSpec::new("research", AgentRole::Research))
        .add_node(NodeSpec::new("summarizer", AgentRole::Summarizer).with_return_output(true))
        .add_edge_spec(
            EdgeSpec::map("planner", "research").with_output_transform(SplitTags::new("question")),
        )
        .add_edge_spec(
            EdgeSpec::reduce("research", "summarizer")
                .with_output_transform(JoinResponses::new("\n---\n")),
        )
        .compile()
        .expect("fan-out workflow compiles")
}

/// A linear chain of assistant nodes; the last one returns the run output.
pub fn chain(ids: &[&str]) -> Workflow {
    let mut builder = GraphBuilder::new();
    for (index, id) in ids.iter().enumerate() {
        let mut spec = NodeSpec::new(*id, AgentRole::Assistant);
        if index == ids.len() - 1 {
            spec = spec.with_return_output(true);
        }
        builder = builder.add_node(spec);
    }
    for pair in ids.windows(2) {
        builder = builder.add_edge(pair[0], pair[1]);
    }
    builder.compile().expect("chain compiles")
}

pub fn thread() -> ThreadContext {
    ThreadContext::new("thread-1", "item-1")
}

/// Executor with sinks disabled; tests observe runs through streaming
/// subscriptions or the returned [`braidflow::executor::FinalResult`].
pub fn silent_executor(workflow: Workflow, model: Arc<dyn ModelClient>) -> GraphExecutor {
    GraphExecutor::new(workflow, NodeExecutor::new(model))
        .with_config(ExecutorConfig::new().with_event_bus(EventBusConfig::silent()))
}

/// Drain a subscription until the run-terminal event.
pub async fn collect_events(events: EventStream) -> Vec<GraphEvent> {
    events.into_async_stream().collect().await
}
