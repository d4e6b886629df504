//! Notices published by the TNC dispatcher

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::arq::{ArqStream, ConnectionInfo};
use crate::protocol::constants::State;
use crate::protocol::response::Response;
use crate::tncio::session::SessionHandle;

/// Something the TNC reported, or the driver did on its own
///
/// Obtain a stream of notices with `ArdopTnc::events()`.
#[derive(Debug, Clone)]
pub enum Notice {
    /// A line from the TNC's control port
    Response(Response),

    /// An ARQ session has opened
    ///
    /// Published just before the `CONNECTED` response which
    /// announced it.
    SessionOpened(SessionOffer),

    /// The inbound buffer stayed full for the whole grace
    /// period, and the session is being disconnected
    InboundStalled,
}

impl Notice {
    /// The new state, if this is a state transition
    pub fn state_change(&self) -> Option<State> {
        match self {
            Notice::Response(Response::NewState(st)) => Some(*st),
            _ => None,
        }
    }
}

/// A newly opened ARQ session, awaiting its owner
///
/// The session's stream can be claimed exactly once, by
/// whichever holder of the offer claims it first.
#[derive(Clone)]
pub struct SessionOffer {
    info: ConnectionInfo,
    handle: Arc<Mutex<Option<SessionHandle>>>,
}

impl SessionOffer {
    pub(crate) fn new(handle: SessionHandle) -> Self {
        SessionOffer {
            info: handle.info.clone(),
            handle: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Connection information
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Take ownership of the session
    ///
    /// Returns `None` if the session was already claimed.
    /// Sessions which are never claimed are disconnected
    /// as soon as the peer sends data.
    pub fn claim(&self) -> Option<ArqStream> {
        let handle = match self.handle.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        handle.map(ArqStream::new)
    }
}

impl fmt::Debug for SessionOffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SessionOffer({})", &self.info)
    }
}
