//! Transport seam between the bridge and tool servers.

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use super::ToolDescriptor;

/// One page of a server's tool listing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolPage {
    pub tools: Vec<ToolDescriptor>,
    /// Opaque cursor for the next page; `None` when the listing is complete.
    pub next_cursor: Option<String>,
}

/// Wire-level connection to a single tool server.
///
/// Implementations own their connection state. `close` may be called more
/// than once; later calls must be harmless.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Fetch one page of the server's tools.
    async fn list_tools(&self, cursor: Option<String>) -> Result<ToolPage, TransportError>;

    /// Invoke a tool and return its raw result payload.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, TransportError>;

    /// Release the connection.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds transports from server URLs.
///
/// The bridge never constructs a transport itself, so embedders can point
/// the whole engine at in-process fakes by supplying a different factory.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn ToolTransport>, TransportError>;
}

/// Wire-level failures, independent of any HTTP client type.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum TransportError {
    #[error("failed to connect to `{url}`: {message}")]
    #[diagnostic(
        code(braidflow::tools::connect),
        help("verify the server URL and that the tool server is running")
    )]
    Connect { url: String, message: String },

    /// The server answered with a JSON-RPC error object.
    #[error("server returned error {code}: {message}")]
    #[diagnostic(code(braidflow::tools::rpc))]
    Rpc { code: i64, message: String },

    /// The response did not fit the expected JSON-RPC shape.
    #[error("malformed server response: {message}")]
    #[diagnostic(code(braidflow::tools::malformed))]
    Malformed { message: String },

    #[error("transport io error: {message}")]
    #[diagnostic(code(braidflow::tools::io))]
    Io { message: String },
}

impl TransportError {
    pub fn connect(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}
