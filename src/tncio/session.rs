//! State shared between the dispatcher and an `ArqStream`
//!
//! The dispatcher is the only writer of session state. The
//! stream side observes it through atomics and is woken
//! through `AtomicWaker`s when it changes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::task::{AtomicWaker, Waker};

use crate::arq::ConnectionInfo;
use crate::framing::Outbound;

/// Signals for one ARQ session
pub(crate) struct SessionShared {
    pending: AtomicU64,
    closed: AtomicBool,
    writable: AtomicWaker,
    closing: AtomicWaker,
}

impl SessionShared {
    pub fn new() -> Arc<Self> {
        Arc::new(SessionShared {
            pending: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            writable: AtomicWaker::new(),
            closing: AtomicWaker::new(),
        })
    }

    /// Bytes accepted by the TNC but not yet acknowledged by the peer
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Record a `BUFFER` report from the TNC
    pub fn set_pending(&self, pending: u64) {
        let old = self.pending.swap(pending, Ordering::SeqCst);
        if pending < old {
            self.writable.wake();
        }
    }

    /// Count bytes handed to the writer
    pub fn add_pending(&self, sent: u64) {
        self.pending.fetch_add(sent, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// End the session, releasing any blocked reader or writer
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.writable.wake();
        self.closing.wake();
    }

    pub fn register_writable(&self, waker: &Waker) {
        self.writable.register(waker);
    }

    pub fn register_closing(&self, waker: &Waker) {
        self.closing.register(waker);
    }
}

/// An ARQ session as handed from the dispatcher to a caller
pub(crate) struct SessionHandle {
    pub info: ConnectionInfo,
    pub inbound: mpsc::Receiver<Bytes>,
    pub shared: Arc<SessionShared>,
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub send_high_water: u64,
}
