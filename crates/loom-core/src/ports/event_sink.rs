//! EventSink port - where the queue publishes lifecycle events.

use crate::domain::QueueEvent;

/// EventSink receives every event the queue emits, after the snapshot it
/// carries has been persisted.
///
/// Delivery is synchronous and infallible from the queue's point of view; a
/// sink that can fail must handle that itself.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &QueueEvent);
}

