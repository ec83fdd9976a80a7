//! Model client abstraction.
//!
//! The engine never talks to a provider SDK directly. Node executors hand a
//! [`ModelRequest`] to a [`ModelClient`] and consume the resulting chunk
//! stream, so providers, gateways, and scripted test doubles all plug in
//! behind the same seam.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use miette::Diagnostic;
use thiserror::Error;

use crate::message::Message;
use crate::tools::ToolDescriptor;
use crate::types::ToolCall;

/// Chunk stream returned by [`ModelClient::stream`].
pub type ModelStream = BoxStream<'static, Result<ModelChunk, ModelError>>;

/// One model turn: the prompt, the conversation so far, and the tools the
/// model may call.
#[derive(Clone, Debug, Default)]
pub struct ModelRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
    /// Ask the provider to surface its reasoning as [`ModelChunk::Reasoning`].
    pub reasoning: bool,
}

impl ModelRequest {
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }
}

/// One element of a model's streamed response.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelChunk {
    /// A fragment of the model's reasoning trace.
    Reasoning(String),
    /// A fragment of assistant output text.
    Text(String),
    /// A structured payload, e.g. from a JSON-mode response.
    Object(serde_json::Value),
    /// The model wants a tool invoked before it continues.
    ToolRequest(ToolCall),
    /// End of this turn. Nothing follows.
    Done,
}

/// Errors surfaced by a model provider.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ModelError {
    /// The provider rejected the request before any chunk was produced.
    #[error("model provider error: {message}")]
    #[diagnostic(
        code(braidflow::llm::provider),
        help("check provider credentials and request limits")
    )]
    Provider { message: String },

    /// The stream broke mid-response.
    #[error("model stream error: {message}")]
    #[diagnostic(code(braidflow::llm::stream))]
    Stream { message: String },
}

impl ModelError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }
}

/// Unified interface to a streaming language model.
///
/// Implementations translate [`ModelRequest`] into their provider's wire
/// format and normalize the response into [`ModelChunk`]s. A stream that
/// requests tools is expected to finish the turn ([`ModelChunk::Done`])
/// after the requests; the executor runs the tools and starts a new turn
/// with the results appended to the conversation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Open a streaming completion for one turn.
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream, ModelError>;

    /// Client name for logs and diagnostics.
    fn name(&self) -> &str {
        "model"
    }
}
