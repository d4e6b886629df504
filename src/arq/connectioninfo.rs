use std::convert::Into;
use std::fmt;
use std::string::String;

/// Connection direction
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CallDirection {
    /// An outgoing connection, via `ARQCALL`
    ///
    /// Parameters:
    /// - My callsign (`MYCALL`), as last reported by the TNC
    Outgoing(String),

    /// An incoming connection, via `LISTEN`
    ///
    /// Parameters:
    /// - Callsign "dialed" by peer, from the TNC's `TARGET`
    ///   report. Either `MYCALL` or one of `MYAUX`.
    Incoming(String),
}

/// Metadata for one ARQ session
///
/// Built by the dispatcher when the TNC reports `CONNECTED`.
/// Immutable thereafter.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ConnectionInfo {
    peer_call: String,
    peer_grid: Option<String>,
    bandwidth: u16,
    direction: CallDirection,
}

impl ConnectionInfo {
    /// Record a new connection
    ///
    /// Parameters
    /// - `peer_call`: Peer callsign
    /// - `peer_grid`: Peer gridsquare, if known
    /// - `bandwidth`: Connection bandwidth (Hz)
    /// - `direction`: Connection direction
    pub fn new<S>(
        peer_call: S,
        peer_grid: Option<String>,
        bandwidth: u16,
        direction: CallDirection,
    ) -> ConnectionInfo
    where
        S: Into<String>,
    {
        ConnectionInfo {
            peer_call: peer_call.into(),
            peer_grid,
            bandwidth,
            direction,
        }
    }

    /// Peer callsign, as reported in `CONNECTED`
    pub fn peer_call(&self) -> &str {
        &self.peer_call
    }

    /// Peer Maidenhead Grid Square, if reported
    pub fn peer_grid(&self) -> Option<&str> {
        self.peer_grid.as_ref().map(String::as_str)
    }

    /// Connection bandwidth, in Hz
    pub fn bandwidth(&self) -> u16 {
        self.bandwidth
    }

    /// Connection direction (incoming vs outgoing)
    pub fn direction(&self) -> &CallDirection {
        &self.direction
    }

    /// True if the peer called us
    pub fn is_incoming(&self) -> bool {
        match self.direction {
            CallDirection::Incoming(_) => true,
            CallDirection::Outgoing(_) => false,
        }
    }

    /// Our side of the link
    ///
    /// The callsign the peer dialed, for incoming sessions,
    /// or our own callsign for outgoing ones. May be empty if
    /// the TNC never reported `MYCALL`.
    pub fn local_call(&self) -> &str {
        match &self.direction {
            CallDirection::Outgoing(c) => c,
            CallDirection::Incoming(t) => t,
        }
    }
}

// CALLER>CALLED [GRID][BW Hz]
impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (fm, to) = if self.is_incoming() {
            (self.peer_call(), self.local_call())
        } else {
            (self.local_call(), self.peer_call())
        };
        write!(
            f,
            "{}>{} [{}][{} Hz]",
            fm,
            to,
            self.peer_grid().unwrap_or("????"),
            self.bandwidth
        )
    }
}
