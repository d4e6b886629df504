//! In-process publish/subscribe
//!
//! The dispatcher publishes every decoded reply and
//! notification here. Each subscriber owns an unbounded queue,
//! so a slow subscriber never stalls the publisher.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::channel::mpsc;
use futures::stream::{FusedStream, Stream};
use futures::task::{Context, Poll};

/// Fan-out hub for published messages
pub struct Broadcaster<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

struct Registry<T> {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<T>>,
    closed: bool,
}

/// One subscriber's ordered queue of messages
///
/// Observes every message published after it was created.
/// Dropping the subscription unsubscribes it.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: Clone> Broadcaster<T> {
    /// New broadcaster with no subscribers
    pub fn new() -> Self {
        Broadcaster {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: HashMap::new(),
                closed: false,
            })),
        }
    }

    /// Register a new subscriber
    ///
    /// If the broadcaster is closed, the returned subscription
    /// ends immediately.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded();
        let mut reg = lock(&self.registry);
        let id = reg.next_id;
        reg.next_id += 1;
        if !reg.closed {
            reg.subscribers.insert(id, tx);
        }
        Subscription {
            id,
            rx,
            registry: self.registry.clone(),
        }
    }

    /// Deliver `msg` to every current subscriber
    ///
    /// Never blocks. Subscribers which have gone away are
    /// pruned.
    pub fn publish(&self, msg: T) {
        let mut reg = lock(&self.registry);
        reg.subscribers
            .retain(|_id, tx| tx.unbounded_send(msg.clone()).is_ok());
    }

    /// End every subscription
    ///
    /// Messages already queued are still delivered, after
    /// which each subscription ends. Later publications are
    /// discarded.
    pub fn close(&self) {
        let mut reg = lock(&self.registry);
        reg.closed = true;
        reg.subscribers.clear();
    }

    /// True once `close()` has been called
    pub fn is_closed(&self) -> bool {
        lock(&self.registry).closed
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).subscribers.len()
    }
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Broadcaster {
            registry: self.registry.clone(),
        }
    }
}

impl<T> Subscription<T> {
    /// Leave the broadcaster
    ///
    /// No further messages will be received. Equivalent
    /// to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<T>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl<T> FusedStream for Subscription<T> {
    fn is_terminated(&self) -> bool {
        self.rx.is_terminated()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let mut reg = lock(&self.registry);
        reg.subscribers.remove(&self.id);
    }
}

// recovers from a poisoned lock
fn lock<T>(reg: &Mutex<Registry<T>>) -> MutexGuard<Registry<T>> {
    match reg.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
