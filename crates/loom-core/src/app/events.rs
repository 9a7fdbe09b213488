//! In-process event bus for queue lifecycle events.
//!
//! - Callbacks registered per [`EventKind`] run synchronously, in
//!   registration order, after the snapshot has been persisted
//! - `subscribe()` hands out an unbounded channel receiving every event
//! - Attached [`EventSink`]s see every event as well
//!
//! Closed subscriber channels are dropped on the next publish.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::domain::{EventKind, QueueEvent};
use crate::ports::EventSink;

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<QueueEvent>>>,
    sinks: Mutex<Vec<Arc<dyn EventSink>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one kind of event.
    pub fn on<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        lock(&self.listeners)
            .entry(kind)
            .or_default()
            .push(Arc::new(callback));
    }

    /// Receive every event on a channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<QueueEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    pub fn attach(&self, sink: Arc<dyn EventSink>) {
        lock(&self.sinks).push(sink);
    }

    pub fn publish(&self, event: QueueEvent) {
        // Snapshot under the lock, call outside it: a callback may register
        // another callback.
        let listeners: Vec<Listener> = lock(&self.listeners)
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener(&event);
        }

        let sinks: Vec<Arc<dyn EventSink>> = lock(&self.sinks).clone();
        for sink in sinks {
            sink.emit(&event);
        }

        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: &QueueEvent) {
        self.publish(event.clone());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
