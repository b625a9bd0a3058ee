//! Pending event queue between the watcher and the coordinator.
//!
//! Unbounded multi-producer queue: pushing never blocks, popping never waits.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use super::events::FileEvent;

/// Insertion-ordered queue of pending file events.
///
/// Only the coordinator pops; any number of [`EventPublisher`]s push.
#[derive(Debug)]
pub struct EventQueue {
    tx: Sender<FileEvent>,
    rx: Receiver<FileEvent>,
}

/// Producer handle for an [`EventQueue`].
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: Sender<FileEvent>,
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Get a producer handle.
    #[must_use]
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            tx: self.tx.clone(),
        }
    }

    /// Append an event.
    pub fn push(&self, event: FileEvent) {
        // the queue owns a receiver, so the channel cannot be disconnected
        let _ = self.tx.send(event);
    }

    /// Take the oldest pending event, or `None` when the queue is empty.
    #[must_use]
    pub fn try_pop(&self) -> Option<FileEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    /// Append an event. Constant time, never blocks.
    ///
    /// Returns `false` if the queue has been dropped.
    pub fn publish(&self, event: FileEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}
