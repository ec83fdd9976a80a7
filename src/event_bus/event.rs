use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{RunStatus, ToolCall, ToolResult};

/// What a [`GraphEvent`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// A chunk of model reasoning, or the completed reasoning trace.
    Reasoning,
    /// A chunk of assistant text, or a pending-step marker with no text.
    Message,
    /// A tool invocation requested by the model.
    ToolCall,
    /// The outcome of a tool invocation.
    ToolResult,
    /// A node instance or the whole run reached a terminal status.
    Done,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Reasoning => "reasoning",
            EventKind::Message => "message",
            EventKind::ToolCall => "toolCall",
            EventKind::ToolResult => "toolResult",
            EventKind::Done => "done",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a run's event stream.
///
/// Events carry everything a subscriber needs to render progress: the branch
/// key of the node instance that produced them (absent for run-level events),
/// the kind and status, optional text and structured payloads, and a
/// timestamp. Exactly one event per run has `is_final == true`: the
/// run-terminal [`EventKind::Done`], after which no further events arrive.
///
/// # Example
///
/// ```
/// use braidflow::event_bus::GraphEvent;
/// use braidflow::types::RunStatus;
///
/// let event = GraphEvent::message_delta("researcher#1", "Oslo is ");
/// let json = event.to_json_value();
///
/// assert_eq!(json["nodeKey"], "researcher#1");
/// assert_eq!(json["type"], "message");
/// assert_eq!(json["status"], "pending");
/// assert_eq!(json["final"], false);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEvent {
    /// Branch key of the originating node instance; `None` for run-level events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_key: Option<String>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
}

impl GraphEvent {
    fn base(node_key: Option<String>, kind: EventKind, status: RunStatus) -> Self {
        Self {
            node_key,
            kind,
            status,
            text: None,
            object: None,
            is_final: false,
            timestamp: Utc::now(),
        }
    }

    /// A streamed chunk of model reasoning.
    pub fn reasoning_delta(node_key: impl Into<String>, text: impl Into<String>) -> Self {
        Self::base(Some(node_key.into()), EventKind::Reasoning, RunStatus::Pending)
            .with_text(text)
    }

    /// The full reasoning trace, emitted once the model stops reasoning.
    pub fn reasoning_complete(node_key: impl Into<String>, text: impl Into<String>) -> Self {
        Self::base(
            Some(node_key.into()),
            EventKind::Reasoning,
            RunStatus::Completed,
        )
        .with_text(text)
    }

    /// A streamed chunk of assistant output text.
    pub fn message_delta(node_key: impl Into<String>, text: impl Into<String>) -> Self {
        Self::base(Some(node_key.into()), EventKind::Message, RunStatus::Pending).with_text(text)
    }

    /// A structured payload produced mid-message, e.g. a JSON-mode response.
    pub fn message_object(node_key: impl Into<String>, object: Value) -> Self {
        Self::base(Some(node_key.into()), EventKind::Message, RunStatus::Pending)
            .with_object(object)
    }

    /// Marker that a step node was dispatched. Carries no text; subscribers
    /// use it to show the step as in progress.
    pub fn step_pending(node_key: impl Into<String>) -> Self {
        Self::base(Some(node_key.into()), EventKind::Message, RunStatus::Pending)
    }

    /// The model requested a tool invocation.
    pub fn tool_call(node_key: impl Into<String>, call: &ToolCall) -> Self {
        Self::base(Some(node_key.into()), EventKind::ToolCall, RunStatus::Pending)
            .with_object(serde_json::to_value(call).unwrap_or(Value::Null))
    }

    /// A tool invocation finished. Status is `Error` when the result carries
    /// an error payload, `Completed` otherwise.
    pub fn tool_result(node_key: impl Into<String>, result: &ToolResult) -> Self {
        let status = if result.is_error() {
            RunStatus::Error
        } else {
            RunStatus::Completed
        };
        Self::base(Some(node_key.into()), EventKind::ToolResult, status)
            .with_object(serde_json::to_value(result).unwrap_or(Value::Null))
    }

    /// A node instance reached a terminal status.
    pub fn node_done(node_key: impl Into<String>, status: RunStatus) -> Self {
        Self::base(Some(node_key.into()), EventKind::Done, status)
    }

    /// The run-terminal event. The only event with `is_final == true`;
    /// subscribers can detach once they see it.
    pub fn run_done(status: RunStatus) -> Self {
        let mut event = Self::base(None, EventKind::Done, status);
        event.is_final = true;
        event
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Convert to the normalized JSON wire schema.
    ///
    /// Optional fields are omitted rather than serialized as `null`:
    ///
    /// ```json
    /// {
    ///   "nodeKey": "researcher#0",
    ///   "type": "message",
    ///   "status": "pending",
    ///   "text": "chunk",
    ///   "final": false,
    ///   "timestamp": "2025-11-03T12:34:56.789+00:00"
    /// }
    /// ```
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(node_key) = &self.node_key {
            map.insert("nodeKey".to_owned(), json!(node_key));
        }
        map.insert("type".to_owned(), json!(self.kind.as_str()));
        map.insert("status".to_owned(), json!(self.status.as_str()));
        if let Some(text) = &self.text {
            map.insert("text".to_owned(), json!(text));
        }
        if let Some(object) = &self.object {
            map.insert("object".to_owned(), object.clone());
        }
        map.insert("final".to_owned(), json!(self.is_final));
        map.insert("timestamp".to_owned(), json!(self.timestamp.to_rfc3339()));
        Value::Object(map)
    }

    /// Compact JSON string of the wire schema.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }

    /// Pretty-printed JSON string of the wire schema.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_json_value())
    }
}

impl fmt::Display for GraphEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.node_key.as_deref().unwrap_or("run");
        match &self.text {
            Some(text) => write!(f, "[{label}] {} {}: {text}", self.kind, self.status.as_str()),
            None => write!(f, "[{label}] {} {}", self.kind, self.status.as_str()),
        }
    }
}
