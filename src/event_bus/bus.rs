use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{sync::oneshot, task};

use super::emitter::{EmitterError, EventEmitter};
use super::event::GraphEvent;
use super::hub::{EventHub, EventHubMetrics, EventStream};
use super::sink::{EventSink, StdOutSink};

/// Default hub capacity when the caller does not configure one.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Identifies a registered sink, for later removal through
/// [`EventBus::remove_sink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SinkId(usize);

struct SinkRegistry {
    entries: Vec<(SinkId, Box<dyn EventSink>)>,
    next_id: usize,
}

impl SinkRegistry {
    fn new(sinks: Vec<Box<dyn EventSink>>) -> Self {
        let entries: Vec<_> = sinks
            .into_iter()
            .enumerate()
            .map(|(index, sink)| (SinkId(index), sink))
            .collect();
        let next_id = entries.len();
        Self { entries, next_id }
    }

    fn insert(&mut self, sink: Box<dyn EventSink>) -> SinkId {
        let id = SinkId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, sink));
        id
    }

    fn remove(&mut self, id: SinkId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }
}

/// Receives events from executors and delivers them on two paths: a
/// broadcast hub for live subscribers, and a queue drained by a background
/// listener into the configured sinks.
///
/// The hub path is synchronous, so [`EventBus::subscribe`] works without the
/// listener running. The sink path buffers until [`EventBus::listen_for_events`]
/// is called, and [`EventBus::stop_listener`] flushes whatever is still queued.
pub struct EventBus {
    sinks: Arc<Mutex<SinkRegistry>>,
    ingest: (flume::Sender<GraphEvent>, flume::Receiver<GraphEvent>),
    hub: Arc<EventHub>,
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    /// Create an event bus with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    /// Create an event bus with multiple sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self::with_sinks_and_capacity(sinks, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an event bus with multiple sinks and an explicit hub capacity.
    pub fn with_sinks_and_capacity(sinks: Vec<Box<dyn EventSink>>, capacity: usize) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(SinkRegistry::new(sinks))),
            ingest: flume::unbounded(),
            hub: EventHub::new(capacity),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Dynamically add a sink (useful for per-request streaming). The
    /// returned id detaches it again via [`EventBus::remove_sink`].
    ///
    /// # Example
    /// ```no_run
    /// use braidflow::event_bus::{ChannelSink, EventBus};
    ///
    /// let bus = EventBus::default();
    /// bus.listen_for_events();
    ///
    /// let (tx, rx) = flume::unbounded();
    /// let id = bus.add_sink(ChannelSink::new(tx));
    /// // Events now go to both stdout and the channel
    /// bus.remove_sink(id);
    /// ```
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) -> SinkId {
        self.sinks.lock().insert(Box::new(sink))
    }

    /// Detach a previously added sink. Returns `false` when the id is not
    /// registered (for example after an earlier removal).
    pub fn remove_sink(&self, id: SinkId) -> bool {
        self.sinks.lock().remove(id)
    }

    /// Emitter handle for producers. Cloneable and safe to hand across tasks.
    pub fn get_emitter(&self) -> BusEmitter {
        BusEmitter {
            hub: Arc::clone(&self.hub),
            ingest: self.ingest.0.clone(),
        }
    }

    /// Subscribe to the live broadcast of events. Works at any time,
    /// including before the sink listener is started.
    pub fn subscribe(&self) -> EventStream {
        self.hub.subscribe()
    }

    pub fn metrics(&self) -> EventHubMetrics {
        self.hub.metrics()
    }

    /// Spawn the background task that drains queued events into the sinks.
    /// Idempotent: calling multiple times has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock();
        if guard.is_some() {
            return;
        }

        let receiver = self.ingest.1.clone();
        let sinks = Arc::clone(&self.sinks);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        // All senders gone, nothing more can arrive.
                        Err(_) => return,
                        Ok(event) => deliver(&sinks, &event),
                    }
                }
            }
            // Shutdown requested: flush what is already queued.
            while let Ok(event) = receiver.try_recv() {
                deliver(&sinks, &event);
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener, flushing pending events first.
    pub async fn stop_listener(&self) {
        let state = { self.listener.lock().take() };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

fn deliver(sinks: &Mutex<SinkRegistry>, event: &GraphEvent) {
    let mut guard = sinks.lock();
    for (_, sink) in guard.entries.iter_mut() {
        if let Err(err) = sink.handle(event) {
            tracing::warn!(error = %err, "event sink rejected event");
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Some(state) = self.listener.lock().take() {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}

/// Emitter backed by an [`EventBus`].
///
/// Each emit is delivered synchronously to hub subscribers and queued for
/// the sink listener. Emission succeeds as long as either path can still
/// accept events.
#[derive(Clone, Debug)]
pub struct BusEmitter {
    hub: Arc<EventHub>,
    ingest: flume::Sender<GraphEvent>,
}

impl EventEmitter for BusEmitter {
    fn emit(&self, event: GraphEvent) -> Result<(), EmitterError> {
        let subscribed = self.hub.publish(event.clone()).is_ok();
        let ingested = self.ingest.send(event).is_ok();
        if subscribed || ingested {
            Ok(())
        } else {
            Err(EmitterError::Closed)
        }
    }
}
