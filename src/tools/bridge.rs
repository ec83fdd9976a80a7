//! Tool registry and call routing.

use std::sync::Arc;

use futures_util::future;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::config::ToolServerConfig;
use super::jsonrpc::JsonRpcFactory;
use super::transport::{ToolTransport, TransportError, TransportFactory};
use super::ToolDescriptor;
use crate::types::{ToolCall, ToolResult};

/// Upper bound on listing pages accepted from one server. A server that
/// echoes the same cursor forever would otherwise never finish.
const MAX_LIST_PAGES: usize = 100;

/// Connects to the configured tool servers and routes calls to them.
///
/// Servers are contacted concurrently during [`ToolBridge::initialize`], but
/// their tools are registered in configuration order, so when two servers
/// advertise the same tool name the later entry in the configuration owns
/// it. Execution failures are returned as typed errors; callers that want
/// model-recoverable behavior fold them into an error-shaped
/// [`ToolResult`].
pub struct ToolBridge {
    factory: Arc<dyn TransportFactory>,
    servers: Vec<ServerHandle>,
    tools: FxHashMap<String, RegisteredTool>,
    order: Vec<String>,
}

struct ServerHandle {
    name: String,
    transport: Arc<dyn ToolTransport>,
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    server: usize,
}

impl ToolBridge {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            servers: Vec::new(),
            tools: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// Bridge over the default JSON-RPC transport.
    pub fn json_rpc() -> Self {
        Self::new(Arc::new(JsonRpcFactory::new()))
    }

    /// Connect to every configured server and merge their tool listings.
    ///
    /// Returns the number of distinct tools registered. Initialization is
    /// tolerant: a server that cannot be reached or lists tools incorrectly
    /// is skipped with a warning, and the bridge serves whatever the
    /// remaining servers advertise. Use [`ToolServerConfig::validate`] for a
    /// strict all-servers-reachable check.
    ///
    /// [`ToolServerConfig::validate`]: super::config::ToolServerConfig::validate
    pub async fn initialize(&mut self, config: &ToolServerConfig) -> Result<usize, ToolBridgeError> {
        let connects = config.servers().iter().map(|entry| async {
            let transport = self.factory.connect(&entry.url).await.map_err(|source| {
                ToolBridgeError::Connect {
                    server: entry.name.clone(),
                    source,
                }
            })?;
            let tools = fetch_all_tools(transport.as_ref(), &entry.name).await?;
            Ok::<_, ToolBridgeError>((entry.name.clone(), transport, tools))
        });

        let mut failures = Vec::new();
        for result in future::join_all(connects).await {
            match result {
                Ok((name, transport, tools)) => {
                    let index = self.servers.len();
                    self.servers.push(ServerHandle { name, transport });
                    for descriptor in tools {
                        self.register(descriptor, index);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unavailable tool server");
                    failures.push(err);
                }
            }
        }

        // Partial outages degrade to fewer tools; a config with no
        // reachable server at all surfaces its first failure.
        if self.servers.is_empty() {
            if let Some(err) = failures.into_iter().next() {
                return Err(err);
            }
        }

        tracing::debug!(
            servers = self.servers.len(),
            tools = self.tools.len(),
            "tool bridge initialized"
        );
        Ok(self.tools.len())
    }

    fn register(&mut self, descriptor: ToolDescriptor, server: usize) {
        let name = descriptor.name.clone();
        let entry = RegisteredTool { descriptor, server };
        if let Some(previous) = self.tools.insert(name.clone(), entry) {
            tracing::warn!(
                tool = %name,
                previous_server = %self.servers[previous.server].name,
                new_server = %self.servers[server].name,
                "duplicate tool name, later server wins"
            );
        } else {
            self.order.push(name);
        }
    }

    /// All registered tools, in registration order, for advertising to the
    /// model.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|t| t.descriptor.clone()))
            .collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Name of the server that owns `tool`, if registered.
    pub fn server_of(&self, tool: &str) -> Option<&str> {
        self.tools
            .get(tool)
            .map(|entry| self.servers[entry.server].name.as_str())
    }

    /// Route one call to the owning server.
    ///
    /// Cancellation is observed while the call is in flight; a cancelled
    /// call returns [`ToolBridgeError::Cancelled`] without waiting for the
    /// server.
    pub async fn execute_tool(
        &self,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolBridgeError> {
        let Some(entry) = self.tools.get(&call.tool_name) else {
            return Err(ToolBridgeError::NotFound {
                tool: call.tool_name.clone(),
            });
        };
        let server = &self.servers[entry.server];

        tokio::select! {
            () = cancel.cancelled() => Err(ToolBridgeError::Cancelled {
                tool: call.tool_name.clone(),
            }),
            result = server.transport.call_tool(&call.tool_name, call.args.clone()) => {
                match result {
                    Ok(value) => Ok(ToolResult::new(call, value)),
                    Err(source) => Err(ToolBridgeError::Execution {
                        tool: call.tool_name.clone(),
                        server: server.name.clone(),
                        source,
                    }),
                }
            }
        }
    }

    /// Close every transport and clear the registry. Safe to call more than
    /// once; later calls do nothing.
    pub async fn close(&mut self) {
        for server in self.servers.drain(..) {
            if let Err(err) = server.transport.close().await {
                tracing::warn!(server = %server.name, error = %err, "tool transport close failed");
            }
        }
        self.tools.clear();
        self.order.clear();
    }
}

async fn fetch_all_tools(
    transport: &dyn ToolTransport,
    server: &str,
) -> Result<Vec<ToolDescriptor>, ToolBridgeError> {
    let mut tools = Vec::new();
    let mut cursor = None;
    let mut pages = 0usize;

    loop {
        let page = transport
            .list_tools(cursor)
            .await
            .map_err(|source| ToolBridgeError::Connect {
                server: server.to_owned(),
                source,
            })?;
        tools.extend(page.tools);
        pages += 1;

        match page.next_cursor {
            Some(next) => {
                if pages >= MAX_LIST_PAGES {
                    return Err(ToolBridgeError::Connect {
                        server: server.to_owned(),
                        source: TransportError::malformed(
                            "tool listing pagination did not terminate",
                        ),
                    });
                }
                cursor = Some(next);
            }
            None => return Ok(tools),
        }
    }
}

/// Failures surfaced by the [`ToolBridge`].
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ToolBridgeError {
    /// The model asked for a tool no server advertises.
    #[error("unknown tool `{tool}`")]
    #[diagnostic(
        code(braidflow::tools::not_found),
        help("the model may be calling a tool outside the advertised set; check server listings")
    )]
    NotFound { tool: String },

    /// The owning server failed the call.
    #[error("tool `{tool}` failed on server `{server}`")]
    #[diagnostic(code(braidflow::tools::execution))]
    Execution {
        tool: String,
        server: String,
        #[source]
        source: TransportError,
    },

    /// The run was cancelled while the call was in flight.
    #[error("tool `{tool}` cancelled")]
    #[diagnostic(code(braidflow::tools::cancelled))]
    Cancelled { tool: String },

    /// A configured server could not be connected or listed.
    #[error("failed to initialize tool server `{server}`")]
    #[diagnostic(code(braidflow::tools::server_init))]
    Connect {
        server: String,
        #[source]
        source: TransportError,
    },
}
