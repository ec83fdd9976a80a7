use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::event::GraphEvent;

/// Abstract event emitter handed to node executors and transports.
///
/// Implementations must be cheap to clone behind an [`Arc`] and safe to call
/// from concurrent branches. Emission is synchronous and non-blocking.
pub trait EventEmitter: Send + Sync + fmt::Debug {
    /// Emit an event. Failure means no consumer could receive it.
    fn emit(&self, event: GraphEvent) -> Result<(), EmitterError>;
}

impl<T: EventEmitter + ?Sized> EventEmitter for Arc<T> {
    fn emit(&self, event: GraphEvent) -> Result<(), EmitterError> {
        (**self).emit(event)
    }
}

/// Errors that can occur when emitting an event.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event hub closed")]
    Closed,
    #[error("event lag exceeded buffer; dropped {0} messages")]
    Lagged(usize),
    #[error("event emission failed: {0}")]
    Other(String),
}

impl EmitterError {
    pub fn other(error: impl Into<String>) -> Self {
        Self::Other(error.into())
    }
}
