//! Per-run execution context: thread identity, read-only conversation
//! history, and the append-only node result ledger.
//!
//! One [`ThreadContext`] and one [`ResultLedger`] exist per `execute()`
//! invocation. The history is caller-supplied and never mutated by the
//! engine; node outputs are appended only to the ledger, which is private to
//! the run and discarded when it ends.
//!
//! # Examples
//!
//! ```rust
//! use braidflow::context::{NodeRecord, ResultLedger, ThreadContext};
//! use braidflow::message::Message;
//! use braidflow::types::RunStatus;
//!
//! let thread = ThreadContext::new("thread-1", "item-9")
//!     .with_history(vec![Message::user("earlier question")]);
//! assert_eq!(thread.history(10).len(), 1);
//!
//! let ledger = ResultLedger::new();
//! ledger.append("planner", NodeRecord::completed("three questions"));
//! assert_eq!(ledger.get("planner").unwrap().output, "three questions");
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::message::Message;
use crate::types::{RunStatus, ToolCall, ToolResult};

/// History slice handed to a node when its spec sets no explicit limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Identity and conversation history for one thread turn.
///
/// `thread_item_id` names the turn being executed; `parent_thread_item_id`
/// links it to the turn it branched from, when the caller tracks that. The
/// history slice is read-only to the engine for the whole run.
#[derive(Clone, Debug, Default)]
pub struct ThreadContext {
    pub thread_id: String,
    pub thread_item_id: String,
    pub parent_thread_item_id: Option<String>,
    history: Vec<Message>,
}

impl ThreadContext {
    #[must_use]
    pub fn new(thread_id: impl Into<String>, thread_item_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            thread_item_id: thread_item_id.into(),
            parent_thread_item_id: None,
            history: Vec::new(),
        }
    }

    /// Attach the caller-supplied conversation history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Link this turn to the turn it branched from.
    #[must_use]
    pub fn with_parent(mut self, parent_thread_item_id: impl Into<String>) -> Self {
        self.parent_thread_item_id = Some(parent_thread_item_id.into());
        self
    }

    /// A bounded, ordered slice of the most recent history for prompt
    /// construction. `limit` counts messages from the end.
    #[must_use]
    pub fn history(&self, limit: usize) -> &[Message] {
        let start = self.history.len().saturating_sub(limit);
        &self.history[start..]
    }

    /// The complete history, oldest first.
    #[must_use]
    pub fn full_history(&self) -> &[Message] {
        &self.history
    }
}

/// The recorded outcome of one node instance.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub output: String,
    pub object: Option<Value>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    pub status: RunStatus,
}

impl NodeRecord {
    /// A completed record with a text output and no tool traffic.
    #[must_use]
    pub fn completed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            object: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            status: RunStatus::Completed,
        }
    }

    /// A failed record whose output carries the human-readable message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            object: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            status: RunStatus::Error,
        }
    }

    /// An aborted record, produced when cancellation lands mid-node.
    #[must_use]
    pub fn aborted(partial_output: impl Into<String>) -> Self {
        Self {
            output: partial_output.into(),
            object: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            status: RunStatus::Aborted,
        }
    }
}

/// One prior node's `{key, output}` pair, as exposed to input transforms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeOutput {
    pub key: String,
    pub output: String,
}

/// Append-only map of `node_key -> NodeRecord` for one run.
///
/// Keys are unique by construction (branch instances get indexed keys), so
/// concurrent appends from parallel branches never contend on the same
/// entry. Cloning the ledger clones the handle, not the data; all clones
/// observe the same appends.
#[derive(Clone, Debug, Default)]
pub struct ResultLedger {
    inner: Arc<RwLock<LedgerInner>>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    records: FxHashMap<String, NodeRecord>,
    order: Vec<String>,
}

impl ResultLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record under `key`. Appending twice under one key replaces
    /// the record but keeps the original position; the executor never does
    /// this for distinct instances, so a repeat is logged as suspicious.
    pub fn append(&self, key: impl Into<String>, record: NodeRecord) {
        let key = key.into();
        let mut inner = self.inner.write();
        if inner.records.insert(key.clone(), record).is_some() {
            tracing::warn!(node_key = %key, "ledger key appended more than once");
        } else {
            inner.order.push(key);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<NodeRecord> {
        self.inner.read().records.get(key).cloned()
    }

    /// Every recorded `{key, output}` in append order.
    ///
    /// This is the `nodes` view handed to input transforms: any ancestor's
    /// output is addressable by key, not only the immediate predecessor.
    #[must_use]
    pub fn outputs(&self) -> Vec<NodeOutput> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|key| {
                inner.records.get(key).map(|record| NodeOutput {
                    key: key.clone(),
                    output: record.output.clone(),
                })
            })
            .collect()
    }

    /// Full snapshot of the ledger in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, NodeRecord)> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|key| {
                inner
                    .records
                    .get(key)
                    .map(|record| (key.clone(), record.clone()))
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_limit_takes_the_tail() {
        let thread = ThreadContext::new("t", "i").with_history(vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
        ]);

        let tail = thread.history(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].content, "two");
        assert_eq!(tail[1].content, "three");

        // A limit larger than the history returns everything.
        assert_eq!(thread.history(10).len(), 3);
        assert!(thread.history(0).is_empty());
    }

    #[test]
    fn ledger_preserves_append_order() {
        let ledger = ResultLedger::new();
        ledger.append("a", NodeRecord::completed("first"));
        ledger.append("b", NodeRecord::completed("second"));
        ledger.append("c", NodeRecord::failed("broke"));

        let outputs = ledger.outputs();
        let keys: Vec<_> = outputs.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(outputs[2].output, "broke");
    }

    #[test]
    fn ledger_clones_share_appends() {
        let ledger = ResultLedger::new();
        let clone = ledger.clone();
        clone.append("x", NodeRecord::completed("shared"));

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("x").unwrap().output, "shared");
    }

    #[test]
    fn repeated_append_replaces_without_reordering() {
        let ledger = ResultLedger::new();
        ledger.append("a", NodeRecord::completed("v1"));
        ledger.append("b", NodeRecord::completed("second"));
        ledger.append("a", NodeRecord::completed("v2"));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("a").unwrap().output, "v2");
        assert_eq!(ledger.outputs()[0].key, "a");
    }
}
