//! The run scheduler. Walks a compiled [`Workflow`] from a start node,
//! dispatching every node whose inputs have arrived, fanning map edges out
//! into branch instances, holding reduce barriers until all branches settle,
//! and emitting the run-terminal event once nothing is left to do.

use std::collections::VecDeque;
use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::context::{DEFAULT_HISTORY_LIMIT, NodeRecord, ResultLedger, ThreadContext};
use crate::event_bus::{BusEmitter, EventStream, GraphEvent};
use crate::graphs::{EdgeRef, Workflow};
use crate::message::Message;
use crate::node::NodeSpec;
use crate::transform::{Transform, TransformContext, TransformError, payload_text};
use crate::types::{EdgePattern, RunStatus, branch_key};

use super::config::{ExecutorConfig, FailurePolicy};
use super::forward;
use super::handle::RunHandle;
use super::node_exec::{NodeExecutor, NodeInput, NodeOutcome, NodeRunError};

/// Failures that end a run.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    #[error("start node `{id}` is not part of the workflow")]
    #[diagnostic(
        code(braidflow::executor::unknown_start),
        help("pass the id of a node added to the GraphBuilder")
    )]
    UnknownStartNode { id: String },

    /// First node failure of the run; under the fail-fast policy this is
    /// what the run returns.
    #[error("node `{key}` failed: {message}")]
    #[diagnostic(code(braidflow::executor::node_failed))]
    NodeFailed { key: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transform(#[from] TransformError),

    #[error("run was aborted")]
    #[diagnostic(code(braidflow::executor::aborted))]
    Aborted,

    #[error("node task did not complete: {0}")]
    #[diagnostic(code(braidflow::executor::join))]
    Join(#[from] tokio::task::JoinError),
}

/// What a finished run hands back.
///
/// `output` comes from the most recently completed node marked
/// `return_output`, falling back to the most recently completed node.
/// `results` is the full ledger in completion order, keyed by branch key.
#[derive(Clone, Debug)]
pub struct FinalResult {
    pub output: String,
    pub object: Option<Value>,
    pub node_key: Option<String>,
    pub results: Vec<(String, NodeRecord)>,
}

/// Runs compiled workflows.
///
/// The executor is cheap to clone and holds no per-run state; every
/// `execute*` call builds its own event bus, ledger, and scheduler, so one
/// executor can serve concurrent runs.
#[derive(Clone)]
pub struct GraphExecutor {
    workflow: Arc<Workflow>,
    node_executor: Arc<NodeExecutor>,
    config: ExecutorConfig,
}

impl GraphExecutor {
    #[must_use]
    pub fn new(workflow: Workflow, node_executor: NodeExecutor) -> Self {
        Self {
            workflow: Arc::new(workflow),
            node_executor: Arc::new(node_executor),
            config: ExecutorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the workflow to completion, delivering events to the configured
    /// sinks.
    pub async fn execute(
        &self,
        start: &str,
        input: Value,
        thread: ThreadContext,
    ) -> Result<FinalResult, ExecutorError> {
        self.execute_with_cancellation(start, input, thread, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), with an externally owned
    /// cancellation token. Cancelling the token stops all further dispatch;
    /// in-flight nodes wind down with aborted terminal events and the run
    /// returns [`ExecutorError::Aborted`].
    #[instrument(skip(self, input, thread, cancel), err)]
    pub async fn execute_with_cancellation(
        &self,
        start: &str,
        input: Value,
        thread: ThreadContext,
        cancel: CancellationToken,
    ) -> Result<FinalResult, ExecutorError> {
        let bus = self.config.event_bus.build_event_bus();
        bus.listen_for_events();
        let result = self
            .run(start, input, thread, bus.get_emitter(), cancel)
            .await;
        bus.stop_listener().await;
        result
    }

    /// Start the run in a background task and return a control handle plus
    /// the live event stream.
    ///
    /// The stream is subscribed before the first node dispatches, so no
    /// events are missed. The run-terminal event (`final == true`) is the
    /// last item; [`RunHandle::join`] then yields the result.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn execute_streaming(
        &self,
        start: &str,
        input: Value,
        thread: ThreadContext,
    ) -> (RunHandle, EventStream) {
        let bus = self.config.event_bus.build_event_bus();
        bus.listen_for_events();
        let events = bus.subscribe();

        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let executor = self.clone();
        let start = start.to_string();
        let join_handle = tokio::spawn(async move {
            let emitter = bus.get_emitter();
            let result = executor.run(&start, input, thread, emitter, child).await;
            bus.stop_listener().await;
            result
        });

        (RunHandle::new(cancel, join_handle), events)
    }

    async fn run(
        &self,
        start: &str,
        input: Value,
        thread: ThreadContext,
        emitter: BusEmitter,
        cancel: CancellationToken,
    ) -> Result<FinalResult, ExecutorError> {
        let Some(start_spec) = self.workflow.node(start) else {
            let failure = ExecutorError::UnknownStartNode {
                id: start.to_string(),
            };
            forward(
                &emitter,
                GraphEvent::run_done(RunStatus::Error).with_text(failure.to_string()),
            );
            return Err(failure);
        };
        let start_spec = Arc::clone(start_spec);

        let query = match input.get("userMessage").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => payload_text(&input),
        };

        let mut state = RunState {
            workflow: Arc::clone(&self.workflow),
            ledger: ResultLedger::new(),
            emitter,
            thread,
            query,
            policy: self.config.failure_policy,
            internal: cancel.child_token(),
            pending: VecDeque::new(),
            joins: FxHashMap::default(),
            barriers: FxHashMap::default(),
            next_group: 0,
            halted: false,
            cancelled: false,
            terminal: None,
            first_error: None,
        };

        debug!(
            start,
            nodes = self.workflow.node_count(),
            policy = ?state.policy,
            "starting run"
        );

        // The start node receives the raw run input; edge transforms only
        // apply to payloads that travel an edge.
        let seed = state.interpret_input(&start_spec, input);
        state.pending.push_back(Dispatch {
            spec: start_spec,
            key: start.to_string(),
            input: seed,
            branch: None,
        });

        let max_in_flight = self.config.max_concurrent_nodes.unwrap_or(usize::MAX);
        let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();

        loop {
            while join_set.len() < max_in_flight {
                let Some(dispatch) = state.pending.pop_front() else {
                    break;
                };
                self.spawn_node(&mut join_set, &state, dispatch);
            }

            if join_set.is_empty() && state.pending.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled(), if !state.cancelled => {
                    state.cancelled = true;
                    warn!("cancellation requested, winding down in-flight nodes");
                    state.halt(RunStatus::Aborted);
                }
                joined = join_set.join_next() => match joined {
                    Some(Ok(outcome)) => state.on_task_done(outcome),
                    Some(Err(join_error)) => state.on_join_error(join_error),
                    None => {}
                },
            }
        }

        state.finish()
    }

    fn spawn_node(&self, join_set: &mut JoinSet<TaskOutcome>, state: &RunState, dispatch: Dispatch) {
        let Dispatch {
            spec,
            key,
            input,
            branch,
        } = dispatch;

        debug!(node = %key, "dispatching node");
        if spec.is_step {
            forward(&state.emitter, GraphEvent::step_pending(&key));
        }

        let node_executor = Arc::clone(&self.node_executor);
        let emitter = state.emitter.clone();
        let cancel = state.internal.clone();
        join_set.spawn(async move {
            let result = node_executor.run(&spec, &key, input, &emitter, &cancel).await;
            TaskOutcome {
                node_id: spec.id.clone(),
                key,
                branch,
                result,
            }
        });
    }
}

/// Identifies one branch instance within a fan-out group.
#[derive(Clone, Copy, Debug)]
struct BranchSlot {
    group: usize,
    index: usize,
    size: usize,
}

struct Dispatch {
    spec: Arc<NodeSpec>,
    key: String,
    input: NodeInput,
    branch: Option<BranchSlot>,
}

struct TaskOutcome {
    node_id: String,
    key: String,
    branch: Option<BranchSlot>,
    result: Result<NodeOutcome, NodeRunError>,
}

/// Payloads gathered so far for a node with multiple incoming edges, keyed
/// by edge id.
struct JoinState {
    payloads: FxHashMap<usize, Value>,
}

/// Outputs gathered so far for one reduce edge and fan-out group. Slots are
/// ordered by branch index, not completion order.
struct ReduceBarrier {
    outputs: Vec<Option<Value>>,
    settled: usize,
}

/// Mutable bookkeeping for one run. Lives on the scheduler task; node tasks
/// only ever see their own `Dispatch`.
struct RunState {
    workflow: Arc<Workflow>,
    ledger: ResultLedger,
    emitter: BusEmitter,
    thread: ThreadContext,
    query: String,
    policy: FailurePolicy,
    internal: CancellationToken,
    pending: VecDeque<Dispatch>,
    joins: FxHashMap<String, JoinState>,
    barriers: FxHashMap<(usize, usize), ReduceBarrier>,
    next_group: usize,
    halted: bool,
    cancelled: bool,
    terminal: Option<RunStatus>,
    first_error: Option<ExecutorError>,
}

impl RunState {
    fn on_task_done(&mut self, outcome: TaskOutcome) {
        match outcome.result {
            Ok(done) => {
                let record = NodeRecord {
                    output: done.output,
                    object: done.object,
                    tool_calls: done.tool_calls,
                    tool_results: done.tool_results,
                    status: RunStatus::Completed,
                };
                let payload = record
                    .object
                    .clone()
                    .unwrap_or_else(|| Value::String(record.output.clone()));
                self.ledger.append(&outcome.key, record);
                forward(
                    &self.emitter,
                    GraphEvent::node_done(&outcome.key, RunStatus::Completed),
                );
                if !self.halted {
                    self.route_completion(&outcome.node_id, outcome.branch, payload);
                }
            }
            Err(NodeRunError::Cancelled { .. }) => {
                // Partial text already reached subscribers as message deltas.
                self.ledger.append(&outcome.key, NodeRecord::aborted(""));
                forward(
                    &self.emitter,
                    GraphEvent::node_done(&outcome.key, RunStatus::Aborted),
                );
            }
            Err(failure @ NodeRunError::Model { .. }) => {
                let message = failure.to_string();
                warn!(node = %outcome.key, %message, "node failed");
                self.ledger.append(&outcome.key, NodeRecord::failed(&message));
                forward(
                    &self.emitter,
                    GraphEvent::node_done(&outcome.key, RunStatus::Error),
                );
                self.on_node_failure(&outcome.node_id, &outcome.key, outcome.branch, message);
            }
        }
    }

    fn on_join_error(&mut self, join_error: tokio::task::JoinError) {
        // A panicking node task is a bug, not a model failure; no policy
        // keeps the run going after one.
        error!(error = %join_error, "node task did not complete");
        if self.first_error.is_none() {
            self.first_error = Some(ExecutorError::Join(join_error));
        }
        self.halt(RunStatus::Error);
    }

    fn on_node_failure(
        &mut self,
        node_id: &str,
        key: &str,
        branch: Option<BranchSlot>,
        message: String,
    ) {
        if self.first_error.is_none() {
            self.first_error = Some(ExecutorError::NodeFailed {
                key: key.to_string(),
                message,
            });
        }
        match self.policy {
            FailurePolicy::FailFast => self.halt(RunStatus::Error),
            FailurePolicy::ContinueBranches => {
                if self.halted {
                    return;
                }
                if let Some(slot) = branch {
                    self.fail_branch_subtree(node_id, slot);
                }
            }
        }
    }

    /// Null-fill every reduce slot the failed branch instance would have
    /// produced, so the surviving branches can still aggregate. Within a
    /// branch the chain is linear by construction, so this walk just follows
    /// sequential edges until it hits the reduce.
    fn fail_branch_subtree(&mut self, node_id: &str, slot: BranchSlot) {
        let mut queue = VecDeque::from([node_id.to_string()]);
        let mut seen = FxHashSet::default();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for edge in self.workflow.outgoing(&current).to_vec() {
                match edge.spec.pattern() {
                    EdgePattern::Reduce => self.offer_reduce_slot(&edge, Some(slot), Value::Null),
                    EdgePattern::Sequential => queue.push_back(edge.spec.to().to_string()),
                    EdgePattern::Map => {}
                }
            }
        }
    }

    fn halt(&mut self, status: RunStatus) {
        if self.terminal.is_none() {
            self.terminal = Some(status);
        }
        self.halted = true;
        self.pending.clear();
        self.internal.cancel();
    }

    fn route_completion(&mut self, node_id: &str, branch: Option<BranchSlot>, payload: Value) {
        for edge in self.workflow.outgoing(node_id).to_vec() {
            if self.halted {
                return;
            }
            match edge.spec.pattern() {
                EdgePattern::Sequential => self.route_sequential(&edge, branch, payload.clone()),
                EdgePattern::Map => self.route_map(&edge, payload.clone()),
                EdgePattern::Reduce => self.offer_reduce_slot(&edge, branch, payload.clone()),
            }
        }
    }

    fn route_sequential(&mut self, edge: &EdgeRef, branch: Option<BranchSlot>, payload: Value) {
        let Some(payload) = self.apply_transform(edge.spec.output_transform(), edge, payload)
        else {
            return;
        };
        if branch.is_some() {
            // Compilation guarantees a branch node's sequential target has
            // this edge as its only input, so there is nothing to join.
            self.enqueue(edge, branch, payload);
        } else {
            self.offer_to_join(edge, payload);
        }
    }

    fn route_map(&mut self, edge: &EdgeRef, payload: Value) {
        let Some(expanded) = self.apply_transform(edge.spec.output_transform(), edge, payload)
        else {
            return;
        };
        let Value::Array(items) = expanded else {
            let failure = TransformError::new(
                "map edge needs an array payload; set an output transform that produces one",
            )
            .bind_edge(edge.spec.label());
            self.on_transform_failure(edge, failure);
            return;
        };

        if items.is_empty() {
            debug!(edge = %edge.spec.label(), "map fan-out is empty, settling reduce edges");
            for downstream in self.workflow.outgoing(edge.spec.to()).to_vec() {
                if downstream.spec.pattern() == EdgePattern::Reduce {
                    self.complete_reduce(&downstream, Vec::new());
                }
            }
            return;
        }

        let group = self.next_group;
        self.next_group += 1;
        let size = items.len();
        debug!(edge = %edge.spec.label(), branches = size, "fanning out");
        for (index, item) in items.into_iter().enumerate() {
            self.enqueue(edge, Some(BranchSlot { group, index, size }), item);
        }
    }

    fn offer_reduce_slot(&mut self, edge: &EdgeRef, branch: Option<BranchSlot>, payload: Value) {
        if self.halted {
            return;
        }
        let Some(slot) = branch else {
            // Reduce out of an unfanned node: a one-element aggregation.
            self.complete_reduce(edge, vec![payload]);
            return;
        };

        let barrier = self
            .barriers
            .entry((edge.id, slot.group))
            .or_insert_with(|| ReduceBarrier {
                outputs: vec![None; slot.size],
                settled: 0,
            });
        if barrier.outputs[slot.index].is_none() {
            barrier.settled += 1;
        }
        barrier.outputs[slot.index] = Some(payload);
        if barrier.settled < barrier.outputs.len() {
            debug!(
                edge = %edge.spec.label(),
                settled = barrier.settled,
                expected = barrier.outputs.len(),
                "reduce barrier waiting"
            );
            return;
        }

        let outputs = self
            .barriers
            .remove(&(edge.id, slot.group))
            .map(|barrier| barrier.outputs)
            .unwrap_or_default()
            .into_iter()
            .map(|slot| slot.unwrap_or(Value::Null))
            .collect();
        self.complete_reduce(edge, outputs);
    }

    /// All branches settled: apply the edge's output transform once over the
    /// index-ordered outputs, then hand the result to the target.
    fn complete_reduce(&mut self, edge: &EdgeRef, outputs: Vec<Value>) {
        let joined = Value::Array(outputs);
        let Some(reduced) = self.apply_transform(edge.spec.output_transform(), edge, joined)
        else {
            return;
        };
        self.offer_to_join(edge, reduced);
    }

    /// Hand a payload to `edge`'s target, holding it until every incoming
    /// edge of the target has delivered when the target has several.
    fn offer_to_join(&mut self, edge: &EdgeRef, payload: Value) {
        if self.halted {
            return;
        }
        let target = edge.spec.to().to_string();
        let expected = self.workflow.incoming(&target).len();
        if expected <= 1 {
            self.enqueue(edge, None, payload);
            return;
        }

        let join = self
            .joins
            .entry(target.clone())
            .or_insert_with(|| JoinState {
                payloads: FxHashMap::default(),
            });
        join.payloads.insert(edge.id, payload);
        if join.payloads.len() < expected {
            debug!(node = %target, gathered = join.payloads.len(), expected, "join waiting");
            return;
        }

        // The highest-priority incoming edge owns the invocation: its
        // payload and input transform shape what the node sees. The other
        // payloads stay addressable through the ledger.
        let mut gathered = self
            .joins
            .remove(&target)
            .map(|join| join.payloads)
            .unwrap_or_default();
        let owning = self.workflow.incoming(&target)[0].clone();
        let payload = gathered.remove(&owning.id).unwrap_or(Value::Null);
        self.enqueue(&owning, None, payload);
    }

    fn enqueue(&mut self, edge: &EdgeRef, branch: Option<BranchSlot>, payload: Value) {
        if self.halted {
            return;
        }
        let target_id = edge.spec.to();
        let spec = match self.workflow.node(target_id) {
            Some(spec) => Arc::clone(spec),
            None => {
                error!(node = target_id, "edge target missing from compiled workflow");
                return;
            }
        };

        let Some(payload) = self.apply_transform(edge.spec.input_transform(), edge, payload)
        else {
            return;
        };
        let key = branch_key(target_id, branch.map(|slot| slot.index));
        let input = self.interpret_input(&spec, payload);
        self.pending.push_back(Dispatch {
            spec,
            key,
            input,
            branch,
        });
    }

    /// Turn an edge payload into what the node actually receives. A
    /// `{"userMessage": ..}` object sets the message directly and may carry
    /// its own `history`; anything else becomes prompt text with the
    /// thread's recent history attached.
    fn interpret_input(&self, spec: &NodeSpec, payload: Value) -> NodeInput {
        let limit = spec.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if let Value::Object(ref fields) = payload {
            if let Some(user_message) = fields.get("userMessage").and_then(Value::as_str) {
                let history = fields
                    .get("history")
                    .cloned()
                    .and_then(|value| serde_json::from_value::<Vec<Message>>(value).ok())
                    .unwrap_or_else(|| self.thread.history(limit).to_vec());
                return NodeInput::new(user_message).with_history(history);
            }
        }
        NodeInput::new(payload_text(&payload)).with_history(self.thread.history(limit).to_vec())
    }

    fn apply_transform(
        &mut self,
        transform: Option<&Arc<dyn Transform>>,
        edge: &EdgeRef,
        payload: Value,
    ) -> Option<Value> {
        let Some(transform) = transform else {
            return Some(payload);
        };
        let nodes = self.ledger.outputs();
        let ctx = TransformContext {
            query: &self.query,
            nodes: &nodes,
            history: self.thread.full_history(),
        };
        match transform.apply(payload, &ctx) {
            Ok(value) => Some(value),
            Err(failure) => {
                self.on_transform_failure(edge, failure.bind_edge(edge.spec.label()));
                None
            }
        }
    }

    /// A transform failure marks the edge's target as failed. It is treated
    /// like a node failure for policy purposes, except that nothing ran, so
    /// there is no branch subtree to null-fill.
    fn on_transform_failure(&mut self, edge: &EdgeRef, failure: TransformError) {
        let message = failure.to_string();
        warn!(edge = %edge.spec.label(), %message, "edge transform failed");
        self.ledger.append(edge.spec.to(), NodeRecord::failed(&message));
        forward(
            &self.emitter,
            GraphEvent::node_done(edge.spec.to(), RunStatus::Error),
        );
        if self.first_error.is_none() {
            self.first_error = Some(ExecutorError::Transform(failure));
        }
        if matches!(self.policy, FailurePolicy::FailFast) {
            self.halt(RunStatus::Error);
        }
    }

    fn returns_output(&self, key: &str) -> bool {
        let id = key.split('#').next().unwrap_or(key);
        self.workflow
            .node(id)
            .is_some_and(|spec| spec.return_output)
    }

    /// Settle the run: pick the final output, emit the terminal event last,
    /// and map the terminal status onto the result.
    fn finish(mut self) -> Result<FinalResult, ExecutorError> {
        let results = self.ledger.snapshot();
        let strong = results
            .iter()
            .rev()
            .find(|(key, record)| record.status == RunStatus::Completed && self.returns_output(key));
        let fallback = results
            .iter()
            .rev()
            .find(|(_, record)| record.status == RunStatus::Completed);

        let status = match self.terminal {
            Some(status) => status,
            None if strong.is_some() || self.first_error.is_none() => RunStatus::Completed,
            None => RunStatus::Error,
        };

        match status {
            RunStatus::Aborted => {
                forward(&self.emitter, GraphEvent::run_done(RunStatus::Aborted));
                Err(ExecutorError::Aborted)
            }
            RunStatus::Error => {
                let failure = self.first_error.take().unwrap_or(ExecutorError::Aborted);
                forward(
                    &self.emitter,
                    GraphEvent::run_done(RunStatus::Error).with_text(failure.to_string()),
                );
                Err(failure)
            }
            RunStatus::Pending | RunStatus::Completed => {
                let (output, object, node_key) = match strong.or(fallback) {
                    Some((key, record)) => {
                        (record.output.clone(), record.object.clone(), Some(key.clone()))
                    }
                    None => (String::new(), None, None),
                };
                forward(&self.emitter, GraphEvent::run_done(RunStatus::Completed));
                Ok(FinalResult {
                    output,
                    object,
                    node_key,
                    results,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::config::EventBusConfig;
    use super::*;
    use crate::event_bus::EventBus;
    use crate::graphs::GraphBuilder;
    use crate::types::AgentRole;
    use serde_json::json;

    fn test_state(workflow: Workflow, thread: ThreadContext) -> RunState {
        RunState {
            workflow: Arc::new(workflow),
            ledger: ResultLedger::new(),
            emitter: EventBus::with_sinks(Vec::new()).get_emitter(),
            thread,
            query: "q".to_string(),
            policy: FailurePolicy::FailFast,
            internal: CancellationToken::new(),
            pending: VecDeque::new(),
            joins: FxHashMap::default(),
            barriers: FxHashMap::default(),
            next_group: 0,
            halted: false,
            cancelled: false,
            terminal: None,
            first_error: None,
        }
    }

    fn linear_workflow() -> Workflow {
        GraphBuilder::new()
            .add_node(NodeSpec::new("a", AgentRole::Assistant))
            .add_node(NodeSpec::new("b", AgentRole::Assistant).with_return_output(true))
            .add_edge("a", "b")
            .compile()
            .unwrap()
    }

    #[test]
    fn object_payload_sets_user_message_and_history() {
        let thread = ThreadContext::new("t", "i").with_history(vec![Message::user("earlier")]);
        let state = test_state(linear_workflow(), thread);
        let spec = NodeSpec::new("n", AgentRole::Assistant);

        let input = state.interpret_input(
            &spec,
            json!({
                "userMessage": "focus on this",
                "history": [{"role": "assistant", "content": "replayed"}],
            }),
        );
        assert_eq!(input.user_message, "focus on this");
        assert_eq!(input.history, vec![Message::assistant("replayed")]);
    }

    #[test]
    fn plain_payload_becomes_text_with_thread_history() {
        let thread = ThreadContext::new("t", "i").with_history(vec![Message::user("earlier")]);
        let state = test_state(linear_workflow(), thread);
        let spec = NodeSpec::new("n", AgentRole::Assistant);

        let input = state.interpret_input(&spec, json!("find the answer"));
        assert_eq!(input.user_message, "find the answer");
        assert_eq!(input.history, vec![Message::user("earlier")]);

        let structured = state.interpret_input(&spec, json!({"topic": "rust"}));
        assert_eq!(structured.user_message, r#"{"topic":"rust"}"#);
    }

    #[test]
    fn final_pick_prefers_return_output_nodes() {
        let state = test_state(linear_workflow(), ThreadContext::new("t", "i"));
        state.ledger.append("b", NodeRecord::completed("the answer"));
        state.ledger.append("a", NodeRecord::completed("scratch"));

        let result = state.finish().unwrap();
        assert_eq!(result.output, "the answer");
        assert_eq!(result.node_key.as_deref(), Some("b"));
        assert_eq!(result.results.len(), 2);
    }

    #[test]
    fn abort_terminal_wins_over_recorded_results() {
        let mut state = test_state(linear_workflow(), ThreadContext::new("t", "i"));
        state.ledger.append("b", NodeRecord::completed("done"));
        state.terminal = Some(RunStatus::Aborted);

        assert!(matches!(state.finish(), Err(ExecutorError::Aborted)));
    }

    #[tokio::test]
    async fn unknown_start_node_is_rejected() {
        let model: Arc<dyn crate::llm::ModelClient> = Arc::new(NeverModel);
        let executor = GraphExecutor::new(linear_workflow(), NodeExecutor::new(model))
            .with_config(ExecutorConfig::new().with_event_bus(EventBusConfig::silent()));

        let failure = executor
            .execute("missing", json!("hello"), ThreadContext::new("t", "i"))
            .await
            .unwrap_err();
        assert!(matches!(
            failure,
            ExecutorError::UnknownStartNode { ref id } if id == "missing"
        ));
    }

    #[derive(Debug)]
    struct NeverModel;

    #[async_trait::async_trait]
    impl crate::llm::ModelClient for NeverModel {
        async fn stream(
            &self,
            _request: crate::llm::ModelRequest,
        ) -> Result<crate::llm::ModelStream, crate::llm::ModelError> {
            Err(crate::llm::ModelError::provider("not wired in this test"))
        }
    }
}
