use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::time::timeout;

use super::emitter::{EmitterError, EventEmitter};
use super::event::GraphEvent;

/// Broadcast fan-out point for [`GraphEvent`]s.
///
/// Publishing is synchronous: subscribers that exist at publish time receive
/// the event immediately, independent of any sink listener. Slow subscribers
/// that fall more than `capacity` events behind lose the oldest events; the
/// loss is counted in [`EventHub::metrics`].
#[derive(Debug)]
pub struct EventHub {
    sender: Sender<GraphEvent>,
    dropped_events: AtomicUsize,
    capacity: usize,
}

impl EventHub {
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self {
            sender,
            dropped_events: AtomicUsize::new(0),
            capacity,
        })
    }

    /// Publish to all current subscribers. Errors with `Closed` when no
    /// subscriber exists to receive the event.
    pub fn publish(&self, event: GraphEvent) -> Result<(), EmitterError> {
        match self.sender.send(event) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(event)) => {
                drop(event);
                Err(EmitterError::Closed)
            }
        }
    }

    pub fn subscribe(self: &Arc<Self>) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
            hub: Arc::clone(self),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metrics(&self) -> EventHubMetrics {
        EventHubMetrics {
            capacity: self.capacity,
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            subscribers: self.sender.receiver_count(),
        }
    }

    pub fn emitter(self: &Arc<Self>) -> HubEmitter {
        HubEmitter {
            hub: Arc::clone(self),
        }
    }
}

/// Point-in-time hub counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventHubMetrics {
    pub capacity: usize,
    /// Events lost to lagging subscribers since the hub was created.
    pub dropped_events: usize,
    pub subscribers: usize,
}

/// Emitter that publishes to hub subscribers only, bypassing sinks. Useful
/// in tests that subscribe directly without a listener task.
#[derive(Clone, Debug)]
pub struct HubEmitter {
    hub: Arc<EventHub>,
}

impl EventEmitter for HubEmitter {
    fn emit(&self, event: GraphEvent) -> Result<(), EmitterError> {
        self.hub.publish(event)
    }
}

/// A live subscription to a hub.
///
/// `recv` surfaces lag explicitly; the iterator and stream adapters skip
/// lagged markers and end after yielding the run-terminal event (the one
/// with `is_final == true`) or when the hub closes.
#[derive(Debug)]
pub struct EventStream {
    receiver: Receiver<GraphEvent>,
    hub: Arc<EventHub>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Result<GraphEvent, broadcast::error::RecvError> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                self.hub
                    .dropped_events
                    .fetch_add(missed as usize, Ordering::Relaxed);
                Err(broadcast::error::RecvError::Lagged(missed))
            }
            Err(err) => Err(err),
        }
    }

    pub fn try_recv(&mut self) -> Result<GraphEvent, broadcast::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(event),
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                self.hub
                    .dropped_events
                    .fetch_add(missed as usize, Ordering::Relaxed);
                Err(broadcast::error::TryRecvError::Lagged(missed))
            }
            Err(err) => Err(err),
        }
    }

    pub fn into_inner(self) -> Receiver<GraphEvent> {
        self.receiver
    }

    pub fn into_blocking_iter(self) -> BlockingEventIter {
        BlockingEventIter {
            receiver: self.receiver,
            hub: self.hub,
            finished: false,
        }
    }

    /// Adapt into an async stream that ends after the run-terminal event.
    pub fn into_async_stream(self) -> impl futures_util::stream::Stream<Item = GraphEvent> {
        stream::unfold(Some(self), |state| async move {
            let mut stream = state?;
            loop {
                match stream.recv().await {
                    Ok(event) => {
                        let next = if event.is_final { None } else { Some(stream) };
                        return Some((event, next));
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Wait up to `duration` for the next event, skipping lag markers.
    pub async fn next_timeout(&mut self, duration: Duration) -> Option<GraphEvent> {
        loop {
            match timeout(duration, self.recv()).await {
                Ok(Ok(event)) => return Some(event),
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_) => return None,
            }
        }
    }
}

/// Blocking iterator over a subscription, for synchronous consumers.
pub struct BlockingEventIter {
    receiver: Receiver<GraphEvent>,
    hub: Arc<EventHub>,
    finished: bool,
}

impl Iterator for BlockingEventIter {
    type Item = GraphEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) => {
                    if event.is_final {
                        self.finished = true;
                    }
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.hub
                        .dropped_events
                        .fetch_add(missed as usize, Ordering::Relaxed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
