//! FILENAME: core/lineup-data/src/bus.rs
//! PURPOSE: Typed publish/subscribe channel for one entity's change events.
//! CONTEXT: Every event source (row store, ranking, provider) owns one bus
//! over a closed event enum. Subscribers receive their own `Receiver` and
//! drain it whenever they are ready to react, so emitting never calls back
//! into subscriber code while the source is mid-mutation.

use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug)]
pub struct EventBus<E> {
    subscribers: Vec<Sender<E>>,
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        EventBus {
            subscribers: Vec::new(),
        }
    }

    /// Registers a new subscriber. Dropping the returned receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<E> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber, pruning disconnected ones.
    pub fn emit(&mut self, event: E) {
        let before = self.subscribers.len();
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        let dropped = before - self.subscribers.len();
        if dropped > 0 {
            log::trace!("event bus pruned {} disconnected subscriber(s)", dropped);
        }
    }

    pub fn emit_all(&mut self, events: impl IntoIterator<Item = E>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects every event currently queued on a subscription without blocking.
pub fn drain<E>(rx: &Receiver<E>) -> Vec<E> {
    rx.try_iter().collect()
}
