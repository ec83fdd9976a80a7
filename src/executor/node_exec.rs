//! Drives one agent node to completion: prompt assembly, the streamed
//! model turn, and the bounded tool-call loop.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::join_all;
use miette::Diagnostic;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::event_bus::{EventEmitter, GraphEvent};
use crate::llm::{ModelChunk, ModelClient, ModelError, ModelRequest};
use crate::message::Message;
use crate::node::NodeSpec;
use crate::tools::{ToolBridge, ToolBridgeError, ToolDescriptor};
use crate::types::{AgentRole, ToolCall, ToolResult};

use super::forward;

const PLANNER_DIRECTIVE: &str = "You are a planning agent. Break the user's request into the \
smallest set of independent research questions, each wrapped in <question></question> tags, \
and output nothing else.";

const RESEARCH_DIRECTIVE: &str = "You are a research agent. Answer the single question you \
are given as factually as possible, using the available tools when they help.";

const SUMMARIZER_DIRECTIVE: &str = "You are a summarizing agent. Synthesize the provided \
findings into one coherent answer, resolving conflicts and removing repetition.";

/// The built-in prompt preamble for a role, if it has one.
///
/// `Assistant` and `Custom` roles carry no preamble; their behavior comes
/// entirely from the node's own system prompt.
#[must_use]
pub fn role_directive(role: &AgentRole) -> Option<&'static str> {
    match role {
        AgentRole::Planner => Some(PLANNER_DIRECTIVE),
        AgentRole::Research => Some(RESEARCH_DIRECTIVE),
        AgentRole::Summarizer => Some(SUMMARIZER_DIRECTIVE),
        AgentRole::Assistant => None,
        AgentRole::Custom(_) => None,
    }
}

fn compose_system_prompt(spec: &NodeSpec) -> Option<String> {
    match (role_directive(&spec.role), spec.system_prompt.as_deref()) {
        (Some(directive), Some(custom)) => Some(format!("{directive}\n\n{custom}")),
        (Some(directive), None) => Some(directive.to_string()),
        (None, Some(custom)) => Some(custom.to_string()),
        (None, None) => None,
    }
}

/// What one node instance receives: the message it should act on, plus the
/// conversation slice that precedes it.
#[derive(Clone, Debug, Default)]
pub struct NodeInput {
    pub user_message: String,
    pub history: Vec<Message>,
}

impl NodeInput {
    #[must_use]
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// The structured result of one node instance.
///
/// `output` is the concatenation of every streamed text chunk across all of
/// the node's model turns, so it always equals what `message` events
/// delivered incrementally.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeOutcome {
    pub output: String,
    pub object: Option<serde_json::Value>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
}

/// Failures that end a node instance.
///
/// Tool execution errors are absent on purpose: they feed back into the
/// node's conversation as error-shaped results and the loop continues.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum NodeRunError {
    #[error("node `{key}` model call failed: {source}")]
    #[diagnostic(
        code(braidflow::executor::model),
        help("check provider credentials and connectivity")
    )]
    Model {
        key: String,
        #[source]
        source: ModelError,
    },

    #[error("node `{key}` was cancelled")]
    #[diagnostic(code(braidflow::executor::cancelled))]
    Cancelled { key: String },
}

impl NodeRunError {
    fn model(key: &str, source: ModelError) -> Self {
        Self::Model {
            key: key.to_string(),
            source,
        }
    }

    fn cancelled(key: &str) -> Self {
        Self::Cancelled {
            key: key.to_string(),
        }
    }
}

/// Executes single node instances against an injected model client and an
/// optional tool bridge.
///
/// One `NodeExecutor` serves every node of a run; it holds no per-node
/// state, so concurrent branch instances can share it freely.
#[derive(Clone)]
pub struct NodeExecutor {
    model: Arc<dyn ModelClient>,
    bridge: Option<Arc<ToolBridge>>,
}

impl NodeExecutor {
    #[must_use]
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            bridge: None,
        }
    }

    #[must_use]
    pub fn with_tool_bridge(mut self, bridge: Arc<ToolBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn tool_bridge(&self) -> Option<&Arc<ToolBridge>> {
        self.bridge.as_ref()
    }

    /// Run one node instance to completion.
    ///
    /// Streams the model, emitting `reasoning` and `message` events as
    /// chunks arrive. When the model requests tools and the node's tool
    /// budget is open, the requests are executed concurrently through the
    /// bridge and their results feed the next turn. Exhausting `tool_steps`
    /// is not an error; the loop exits with whatever text accumulated.
    pub async fn run(
        &self,
        spec: &NodeSpec,
        key: &str,
        input: NodeInput,
        emitter: &dyn EventEmitter,
        cancel: &CancellationToken,
    ) -> Result<NodeOutcome, NodeRunError> {
        let system_prompt = compose_system_prompt(spec);
        let advertised = self.advertised_tools(spec);

        let mut conversation = input.history;
        conversation.push(Message::user(&input.user_message));

        let mut output = String::new();
        let mut object = None;
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();
        let mut reasoning = String::new();
        let mut reasoning_closed = false;
        let mut steps_used = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(NodeRunError::cancelled(key));
            }

            let tools_open = steps_used < spec.tool_steps && !advertised.is_empty();
            let mut request =
                ModelRequest::new(conversation.clone()).with_reasoning(spec.reasoning);
            if let Some(prompt) = &system_prompt {
                request = request.with_system_prompt(prompt.clone());
            }
            if tools_open {
                request = request.with_tools(advertised.clone());
            }

            let mut stream = tokio::select! {
                _ = cancel.cancelled() => return Err(NodeRunError::cancelled(key)),
                opening = self.model.stream(request) => {
                    opening.map_err(|source| NodeRunError::model(key, source))?
                }
            };

            let mut turn_text = String::new();
            let mut requests: Vec<ToolCall> = Vec::new();

            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => return Err(NodeRunError::cancelled(key)),
                    chunk = stream.next() => chunk,
                };
                let Some(chunk) = chunk else { break };
                match chunk.map_err(|source| NodeRunError::model(key, source))? {
                    ModelChunk::Reasoning(delta) => {
                        reasoning.push_str(&delta);
                        forward(emitter, GraphEvent::reasoning_delta(key, delta));
                    }
                    ModelChunk::Text(delta) => {
                        turn_text.push_str(&delta);
                        forward(emitter, GraphEvent::message_delta(key, delta));
                    }
                    ModelChunk::Object(value) => {
                        forward(emitter, GraphEvent::message_object(key, value.clone()));
                        object = Some(value);
                    }
                    ModelChunk::ToolRequest(call) => requests.push(call),
                    ModelChunk::Done => break,
                }
            }

            if !reasoning_closed && !reasoning.is_empty() {
                reasoning_closed = true;
                forward(emitter, GraphEvent::reasoning_complete(key, reasoning.clone()));
            }

            output.push_str(&turn_text);

            if requests.is_empty() {
                break;
            }
            if !tools_open {
                warn!(
                    node = key,
                    "model requested tools with the budget closed, keeping current text"
                );
                break;
            }

            steps_used += 1;
            if !turn_text.is_empty() {
                conversation.push(Message::assistant(&turn_text));
            }

            let results = self.execute_round(key, &requests, emitter, cancel).await?;
            for (call, result) in requests.drain(..).zip(results) {
                conversation.push(Message::tool(&format!(
                    "[{}] {}",
                    result.tool_name,
                    result.as_text()
                )));
                tool_calls.push(call);
                tool_results.push(result);
            }
        }

        debug!(node = key, steps_used, chars = output.len(), "node finished");

        Ok(NodeOutcome {
            output,
            object,
            tool_calls,
            tool_results,
        })
    }

    /// Execute one round of tool requests concurrently.
    ///
    /// `toolCall` events go out in request order before any execution
    /// starts; `toolResult` events follow in the same order once every call
    /// settles, so subscribers see deterministic pairs even though the
    /// remote calls overlap.
    async fn execute_round(
        &self,
        key: &str,
        requests: &[ToolCall],
        emitter: &dyn EventEmitter,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResult>, NodeRunError> {
        let Some(bridge) = &self.bridge else {
            return Ok(requests
                .iter()
                .map(|call| ToolResult::error(call, "no tool bridge configured"))
                .collect());
        };

        for call in requests {
            forward(emitter, GraphEvent::tool_call(key, call));
        }

        let outcomes = join_all(
            requests
                .iter()
                .map(|call| bridge.execute_tool(call, cancel)),
        )
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (call, outcome) in requests.iter().zip(outcomes) {
            let result = match outcome {
                Ok(result) => result,
                Err(ToolBridgeError::Cancelled { .. }) => {
                    return Err(NodeRunError::cancelled(key));
                }
                Err(error) => {
                    warn!(node = key, %error, "tool call failed, feeding the error back");
                    ToolResult::error(call, &error)
                }
            };
            forward(emitter, GraphEvent::tool_result(key, &result));
            results.push(result);
        }
        Ok(results)
    }

    /// The descriptors advertised to the model for this node: the node's
    /// declared tool names intersected with what the bridge discovered.
    fn advertised_tools(&self, spec: &NodeSpec) -> Vec<ToolDescriptor> {
        if !spec.uses_tools() {
            return Vec::new();
        }
        let Some(bridge) = &self.bridge else {
            warn!(node = %spec.id, "node declares tools but no bridge is configured");
            return Vec::new();
        };
        for tool_ref in &spec.tools {
            if !bridge.has_tool(&tool_ref.name) {
                warn!(node = %spec.id, tool = %tool_ref.name, "declared tool was never discovered");
            }
        }
        let wanted: FxHashSet<&str> = spec.tools.iter().map(|t| t.name.as_str()).collect();
        bridge
            .descriptors()
            .into_iter()
            .filter(|descriptor| wanted.contains(descriptor.name.as_str()))
            .collect()
    }
}
