//! Core types for the braidflow orchestration engine.
//!
//! This module defines the fundamental vocabulary shared by every layer of
//! the engine: what an agent node *is* ([`AgentRole`]), how edges move data
//! ([`EdgePattern`]), what state a node or run is in ([`RunStatus`]), and the
//! tool invocation pair ([`ToolCall`] / [`ToolResult`]) exchanged between a
//! node's model loop and the tool bridge.
//!
//! # Examples
//!
//! ```rust
//! use braidflow::types::{AgentRole, EdgePattern, RunStatus};
//!
//! let role = AgentRole::from("research");
//! assert_eq!(role, AgentRole::Research);
//! assert_eq!(role.as_str(), "research");
//!
//! assert_eq!(EdgePattern::Map.as_str(), "map");
//! assert!(RunStatus::Aborted.is_terminal());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// The role a node plays in a workflow, as a closed discriminated union.
///
/// Every node binds to exactly one role, and the executor matches roles
/// exhaustively when it frames the node's prompt. Arbitrary roles remain
/// expressible through [`Custom`](Self::Custom) without losing the
/// exhaustive-match guarantee at the call sites that care.
///
/// # Examples
///
/// ```rust
/// use braidflow::types::AgentRole;
///
/// let planner = AgentRole::Planner;
/// assert_eq!(planner.encode(), "planner");
/// assert_eq!(AgentRole::decode("planner"), planner);
///
/// // Unknown labels round-trip through Custom
/// let custom = AgentRole::decode("fact-checker");
/// assert_eq!(custom, AgentRole::Custom("fact-checker".to_string()));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    /// Decomposes a request into discrete sub-questions for fan-out.
    Planner,
    /// Investigates one question, typically with tool access.
    Research,
    /// Merges fan-in branch outputs into a single coherent answer.
    Summarizer,
    /// Plain conversational step with no special framing.
    Assistant,
    /// Application-defined role identified by a label.
    Custom(String),
}

impl AgentRole {
    /// Encode the role into its stable string label.
    #[must_use]
    pub fn encode(&self) -> String {
        self.as_str().to_string()
    }

    /// Decode a string label back into an `AgentRole`.
    ///
    /// Unrecognized labels become [`Custom`](Self::Custom), so role sets can
    /// grow without breaking older callers.
    pub fn decode(s: &str) -> Self {
        match s {
            "planner" => AgentRole::Planner,
            "research" => AgentRole::Research,
            "summarizer" => AgentRole::Summarizer,
            "assistant" => AgentRole::Assistant,
            other => AgentRole::Custom(other.to_string()),
        }
    }

    /// The canonical string label for this role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Research => "research",
            AgentRole::Summarizer => "summarizer",
            AgentRole::Assistant => "assistant",
            AgentRole::Custom(label) => label,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for AgentRole {
    fn from(s: &str) -> Self {
        AgentRole::decode(s)
    }
}

/// Fan-out/fan-in pattern carried by an edge.
///
/// The pattern governs how one upstream completion becomes downstream
/// dispatches:
///
/// - [`Sequential`](Self::Sequential): one completion, one dispatch.
/// - [`Map`](Self::Map): the edge's output transform yields an array and the
///   target runs once per element, concurrently.
/// - [`Reduce`](Self::Reduce): a barrier; the target runs once after every
///   contributing branch has settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePattern {
    Sequential,
    Map,
    Reduce,
}

impl EdgePattern {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgePattern::Sequential => "sequential",
            EdgePattern::Map => "map",
            EdgePattern::Reduce => "reduce",
        }
    }
}

impl fmt::Display for EdgePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a node instance or of a whole run.
///
/// `Pending` only ever appears on in-flight events; ledger records and
/// terminal events always carry one of the three terminal variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Completed,
    Error,
    Aborted,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
            RunStatus::Aborted => "aborted",
        }
    }

    /// Returns `true` for `Completed`, `Error`, and `Aborted`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tool invocation requested by a node's model.
///
/// Created when the model asks for a tool, consumed exactly once by the tool
/// bridge, and discarded after its result feeds back into the node's local
/// loop. `tool_call_id` pairs the call with its [`ToolResult`] in the event
/// stream; when a model does not supply one, [`ToolCall::new`] generates a
/// UUID so the pairing stays unambiguous.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: Value,
}

impl ToolCall {
    /// Create a call with a generated id.
    #[must_use]
    pub fn new(tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_call_id: Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            args,
        }
    }

    /// Create a call with a caller-supplied id.
    #[must_use]
    pub fn with_id(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// The outcome of one [`ToolCall`], successful or error-shaped.
///
/// A failed remote call is not fatal to the node: the bridge error is folded
/// into an error-shaped result (see [`ToolResult::error`]) and handed back to
/// the model, which can acknowledge the failure and continue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: Value,
}

impl ToolResult {
    #[must_use]
    pub fn new(call: &ToolCall, result: Value) -> Self {
        Self {
            tool_call_id: call.tool_call_id.clone(),
            tool_name: call.tool_name.clone(),
            result,
        }
    }

    /// Build an error-shaped result from a failed call.
    #[must_use]
    pub fn error(call: &ToolCall, message: impl fmt::Display) -> Self {
        Self {
            tool_call_id: call.tool_call_id.clone(),
            tool_name: call.tool_name.clone(),
            result: serde_json::json!({ "error": message.to_string() }),
        }
    }

    /// Returns `true` if this result carries an error payload.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.result.get("error").is_some()
    }

    /// The result rendered as text for feeding back into the conversation.
    #[must_use]
    pub fn as_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Key for one dispatched instance of a node.
///
/// Plain dispatches use the node id as-is; map-branch instances get
/// `"{id}#{index}"` so ledger entries and event streams stay distinct per
/// branch.
#[must_use]
pub fn branch_key(node_id: &str, branch: Option<usize>) -> String {
    match branch {
        Some(index) => format!("{node_id}#{index}"),
        None => node_id.to_string(),
    }
}
