//! Workflow execution.
//!
//! [`GraphExecutor`] schedules a compiled workflow: it seeds the start node,
//! fans map edges out into parallel branch instances, holds reduce barriers
//! until every branch settles, and finishes the run with a single terminal
//! event. [`NodeExecutor`] drives each node instance through its model turns
//! and tool calls. Both report progress through the event bus configured on
//! [`ExecutorConfig`], so callers choose between sink delivery
//! ([`GraphExecutor::execute`]) and a live stream plus control handle
//! ([`GraphExecutor::execute_streaming`]).
//!
//! Failure handling defaults to [`FailurePolicy::FailFast`]: the first node
//! failure halts all further dispatch and the run returns that error.
//! [`FailurePolicy::ContinueBranches`] instead lets surviving parallel
//! branches finish and aggregates over the subset that completed.

mod config;
mod graph_exec;
mod handle;
mod node_exec;

pub use config::{EventBusConfig, ExecutorConfig, FailurePolicy, SinkConfig};
pub use graph_exec::{ExecutorError, FinalResult, GraphExecutor};
pub use handle::RunHandle;
pub use node_exec::{NodeExecutor, NodeInput, NodeOutcome, NodeRunError, role_directive};

use crate::event_bus::{EventEmitter, GraphEvent};

/// Emit through the injected emitter, logging instead of failing the run
/// when no consumer can receive events.
pub(crate) fn forward(emitter: &dyn EventEmitter, event: GraphEvent) {
    if let Err(error) = emitter.emit(event) {
        tracing::warn!(%error, "event dropped, nothing could receive it");
    }
}
