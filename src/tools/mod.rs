//! Remote tool invocation.
//!
//! Tool servers are external processes reached over a [`ToolTransport`].
//! The [`ToolBridge`] connects to every configured server, merges their
//! advertised tools into one registry, and routes each [`crate::types::ToolCall`]
//! to the server that owns the tool. The default transport speaks JSON-RPC
//! 2.0 over HTTP ([`JsonRpcTransport`]); tests swap in in-process fakes
//! through the [`TransportFactory`] seam.

pub mod bridge;
pub mod config;
pub mod jsonrpc;
pub mod transport;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use bridge::{ToolBridge, ToolBridgeError};
pub use config::{ToolServerConfig, ToolServerEntry, TOOL_SERVERS_ENV};
pub use jsonrpc::{JsonRpcFactory, JsonRpcTransport};
pub use transport::{ToolPage, ToolTransport, TransportError, TransportFactory};

/// A tool as advertised by a server and offered to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the tool's arguments, when the server publishes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}
