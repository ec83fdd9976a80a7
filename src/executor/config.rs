//! Per-run configuration: event bus wiring and scheduling policy.

use crate::event_bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventSink, MemorySink, StdOutSink};

/// How the executor reacts to a fatal node or transform failure.
///
/// The default mirrors strict semantics: one failed branch ends the whole
/// run. [`ContinueBranches`](FailurePolicy::ContinueBranches) instead lets
/// healthy work finish and reduces over the surviving subset; the failed
/// branch is still recorded and reported per node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop dispatching and cancel in-flight work on the first failure.
    #[default]
    FailFast,
    /// Keep running everything not downstream of the failure; reduce edges
    /// receive `null` in the failed branch's slot.
    ContinueBranches,
}

/// Sink selection for the per-run event bus.
///
/// Mirrors the runtime sinks without forcing callers to construct boxed
/// trait objects up front; additional sinks can still be attached to the
/// built [`EventBus`] directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    /// Human-readable line output on stdout.
    StdOut,
    /// In-memory capture, mostly useful in tests.
    Memory,
}

impl SinkConfig {
    fn build(self) -> Box<dyn EventSink> {
        match self {
            SinkConfig::StdOut => Box::new(StdOutSink::default()),
            SinkConfig::Memory => Box::new(MemorySink::new()),
        }
    }
}

/// Event bus settings carried by [`ExecutorConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBusConfig {
    buffer_capacity: usize,
    sinks: Vec<SinkConfig>,
}

impl EventBusConfig {
    /// Create a config with explicit capacity and sinks. A zero capacity
    /// falls back to [`DEFAULT_CHANNEL_CAPACITY`].
    #[must_use]
    pub fn new(buffer_capacity: usize, sinks: Vec<SinkConfig>) -> Self {
        Self {
            buffer_capacity: if buffer_capacity == 0 {
                DEFAULT_CHANNEL_CAPACITY
            } else {
                buffer_capacity
            },
            sinks,
        }
    }

    /// No sinks at all; events reach subscribers only. The usual choice for
    /// servers that forward the stream themselves.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY, Vec::new())
    }

    #[must_use]
    pub fn add_sink(mut self, sink: SinkConfig) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn sinks(&self) -> &[SinkConfig] {
        &self.sinks
    }

    /// Materialize a fresh [`EventBus`] for one run.
    #[must_use]
    pub fn build_event_bus(&self) -> EventBus {
        let sinks = self.sinks.iter().map(|sink| sink.build()).collect();
        EventBus::with_sinks_and_capacity(sinks, self.buffer_capacity)
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY, vec![SinkConfig::StdOut])
    }
}

/// Settings for a [`GraphExecutor`](super::GraphExecutor).
#[derive(Clone, Debug, Default)]
pub struct ExecutorConfig {
    pub failure_policy: FailurePolicy,
    /// Upper bound on concurrently running node instances. `None` means
    /// unbounded, which matches the widest fan-out the graph declares.
    pub max_concurrent_nodes: Option<usize>,
    pub event_bus: EventBusConfig,
}

impl ExecutorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Cap concurrent node instances; zero is treated as one.
    #[must_use]
    pub fn with_max_concurrent_nodes(mut self, limit: usize) -> Self {
        self.max_concurrent_nodes = Some(limit.max(1));
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBusConfig) -> Self {
        self.event_bus = event_bus;
        self
    }
}
