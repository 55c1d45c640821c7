//! Fan-out of transition events to decoupled observers.

use crate::task::domain::TransitionEvent;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Broadcasts transition events to subscribed observers.
///
/// Delivery is fire-and-forget: a full observer channel drops the event for
/// that observer rather than blocking the transition that produced it, and a
/// closed channel unsubscribes the observer.
pub struct TransitionPublisher {
    capacity: usize,
    senders: RwLock<Vec<mpsc::Sender<TransitionEvent>>>,
}

impl TransitionPublisher {
    /// Creates a publisher whose observer channels buffer `capacity` events.
    ///
    /// A zero capacity is raised to one, the smallest buffer the channel
    /// supports.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity: if capacity == 0 { 1 } else { capacity },
            senders: RwLock::new(Vec::new()),
        }
    }

    /// Registers a new observer and returns its receiving end.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::Receiver<TransitionEvent> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        if let Ok(mut senders) = self.senders.write() {
            senders.push(sender);
        }
        receiver
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.senders.read().map_or(0, |senders| senders.len())
    }

    /// Delivers an event to every observer without blocking.
    pub fn publish(&self, event: &TransitionEvent) {
        let Ok(mut senders) = self.senders.write() else {
            tracing::warn!("observer registry poisoned, dropping transition event");
            return;
        };
        senders.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    task_id = %event.task_id,
                    to_state = %event.to_state,
                    "observer channel full, dropping transition event"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}
