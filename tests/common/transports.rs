//! In-process tool server doubles for bridge and node-executor tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use braidflow::tools::{ToolDescriptor, ToolPage, ToolTransport, TransportError, TransportFactory};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{json, Value};

/// A fake tool server. Lists a fixed set of tools (optionally in pages) and
/// answers calls from a canned table; unanswered tools echo their arguments.
#[derive(Default)]
pub struct FakeTransport {
    tools: Vec<ToolDescriptor>,
    page_size: Option<usize>,
    endless_listing: bool,
    answers: FxHashMap<String, Value>,
    failing: FxHashSet<String>,
    hanging: FxHashSet<String>,
    delays: FxHashMap<String, Duration>,
    calls: Mutex<Vec<(String, Value)>>,
    closed: AtomicUsize,
}

impl FakeTransport {
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(ToolDescriptor::new).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Make `list_tools` hand back a fresh cursor forever.
    #[must_use]
    pub fn with_endless_listing(mut self) -> Self {
        self.endless_listing = true;
        self
    }

    #[must_use]
    pub fn with_answer(mut self, tool: &str, answer: Value) -> Self {
        self.answers.insert(tool.to_string(), answer);
        self
    }

    /// Calls to `tool` fail with an RPC error.
    #[must_use]
    pub fn with_failing(mut self, tool: &str) -> Self {
        self.failing.insert(tool.to_string());
        self
    }

    /// Calls to `tool` never return.
    #[must_use]
    pub fn with_hanging(mut self, tool: &str) -> Self {
        self.hanging.insert(tool.to_string());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.delays.insert(tool.to_string(), delay);
        self
    }

    /// Every call received so far as `(tool, arguments)`, in arrival order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolTransport for FakeTransport {
    async fn list_tools(&self, cursor: Option<String>) -> Result<ToolPage, TransportError> {
        if self.endless_listing {
            return Ok(ToolPage {
                tools: Vec::new(),
                next_cursor: Some("again".to_string()),
            });
        }
        let start: usize = match cursor {
            Some(cursor) => cursor
                .parse()
                .map_err(|_| TransportError::malformed("unparseable cursor"))?,
            None => 0,
        };
        match self.page_size {
            None => Ok(ToolPage {
                tools: self.tools.clone(),
                next_cursor: None,
            }),
            Some(size) => {
                let end = (start + size).min(self.tools.len());
                let next_cursor = (end < self.tools.len()).then(|| end.to_string());
                Ok(ToolPage {
                    tools: self.tools[start..end].to_vec(),
                    next_cursor,
                })
            }
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, TransportError> {
        self.calls.lock().push((name.to_string(), arguments.clone()));
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        if self.hanging.contains(name) {
            futures_util::future::pending::<()>().await;
        }
        if self.failing.contains(name) {
            return Err(TransportError::Rpc {
                code: -32000,
                message: format!("tool `{name}` is broken"),
            });
        }
        Ok(self
            .answers
            .get(name)
            .cloned()
            .unwrap_or_else(|| json!({ "echo": arguments })))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out preregistered transports by URL; any other URL refuses to
/// connect, which stands in for an unreachable server.
#[derive(Default)]
pub struct FakeFactory {
    transports: Mutex<FxHashMap<String, Arc<FakeTransport>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_transport(self, url: &str, transport: Arc<FakeTransport>) -> Self {
        self.transports.lock().insert(url.to_string(), transport);
        self
    }
}

#[async_trait]
impl TransportFactory for FakeFactory {
    async fn connect(&self, url: &str) -> Result<Arc<dyn ToolTransport>, TransportError> {
        match self.transports.lock().get(url) {
            Some(transport) => Ok(Arc::clone(transport) as Arc<dyn ToolTransport>),
            None => Err(TransportError::connect(url, "connection refused")),
        }
    }
}
