//! Event bus utilities providing fan-out, sinks, and subscriber APIs.
//!
//! The module is organised around a broadcast-based [`EventHub`] and helpers
//! for configuring sinks ([`EventBus`]) and consuming the resulting
//! [`EventStream`]. Executors emit [`GraphEvent`]s through the
//! [`EventEmitter`] trait, so tests and embedders can swap the delivery
//! mechanism without touching node code.

pub mod bus;
pub mod emitter;
pub mod event;
pub mod hub;
pub mod sink;

pub use bus::{BusEmitter, EventBus, SinkId, DEFAULT_CHANNEL_CAPACITY};
pub use emitter::{EmitterError, EventEmitter};
pub use event::{EventKind, GraphEvent};
pub use hub::{BlockingEventIter, EventHub, EventHubMetrics, EventStream, HubEmitter};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
