//! Wire tokens of the ARDOP host protocol

use std::fmt;
use std::str::FromStr;

/// Line delimiter in ARDOP control messages
pub const NEWLINE: u8 = b'\r';

/// TNC "true" value
pub const TRUE: &str = "TRUE";

/// TNC "false" value
pub const FALSE: &str = "FALSE";

custom_derive! {
    /// ARDOP protocol modes
    #[derive(Debug, PartialEq, Eq, EnumFromStr, EnumDisplay, Clone, Copy)]
    pub enum ProtocolMode {
        /// Connectionless, forward error-corrected packets
        FEC,

        /// Reliable, connection-oriented protocol with retransmits
        ARQ
    }
}

custom_derive! {
    /// ARDOP command verbs
    ///
    /// Every line exchanged with the TNC starts with one of these
    /// tokens. Replies to host requests carry the token of the
    /// request; unsolicited notifications carry their own.
    #[derive(Debug, PartialEq, Eq, Hash, EnumFromStr, EnumDisplay, Clone, Copy)]
    pub enum CommandID {
        /// Unclean disconnect
        ABORT,

        /// Set ARQ call bandwidth
        ARQBW,

        /// Attempt ARQ connection
        ARQCALL,

        /// Set ARQ timeout
        ARQTIMEOUT,

        /// Attempt link turnover when remote buffer empties
        AUTOBREAK,

        /// Report buffer status
        BUFFER,

        /// Reports that the RF channel is busy
        BUSY,

        /// Pending connect or ping was not for this station
        CANCELPENDING,

        /// Engage or release the sound card
        CODEC,

        /// Reports successful connection attempt
        CONNECTED,

        /// Request retransmission of the last frame
        CRCFAULT,

        /// Send CW ID after a SENDID
        CWID,

        /// Initiate clean disconnect
        DISCONNECT,

        /// Reports that the ARQ link is down
        DISCONNECTED,

        /// TNC command error
        FAULT,

        /// Set Maidenhead grid square
        GRIDSQUARE,

        /// Clear TNC states
        INITIALIZE,

        /// Enable/disable listening for incoming
        LISTEN,

        /// Sets my tactical callsigns for listening
        MYAUX,

        /// Sets my callsign and SSID
        MYCALL,

        /// Reports transitioning to a new State
        NEWSTATE,

        /// A connect request or ping has been detected
        PENDING,

        /// Change the ProtocolMode
        PROTOCOLMODE,

        /// Key or unkey the transmitter
        PTT,

        /// Reports connection rejected by peer
        REJECTED,

        /// Transmit an ID/beacon frame now
        SENDID,

        /// Requests and reports the TNC state
        STATE,

        /// A textual status message
        STATUS,

        /// Reports an incoming call directed at this callsign (MYCALL or one of MYAUX)
        TARGET,

        /// Requests and reports TNC software version
        VERSION
    }
}

custom_derive! {
    /// ARQ Connection States
    #[derive(Debug, PartialEq, Eq, EnumFromStr, EnumDisplay, Clone, Copy)]
    pub enum State {
        /// Codec stopped
        OFFLINE,

        /// ARQ has disconnected
        DISC,

        /// Information Sending Station
        ISS,

        /// Information Receiving Station
        IRS,

        /// Attempting to become the ISS
        IRStoISS,

        /// Not connected or trying to connect, but maybe listening
        IDLE,

        /// Connected, but neither side is sending
        QUIET,

        /// Sending FEC data
        FECSend,

        /// Receiving FEC data
        FECRcv
    }
}

impl State {
    /// True if this state is a connected state
    ///
    /// Returns true if the TNC is connected to a remote
    /// peer when it is in the given state.
    pub fn is_connected(self) -> bool {
        match self {
            State::ISS | State::IRS | State::IRStoISS => true,
            _ => false,
        }
    }

    /// True if the TNC is neither connected nor connecting
    pub fn is_idle(self) -> bool {
        match self {
            State::OFFLINE | State::DISC => true,
            _ => false,
        }
    }

    /// Parse a state token, accepting `DISCONNECTED` for `DISC`
    pub fn from_token(token: &str) -> Option<State> {
        match token {
            "DISCONNECTED" => Some(State::DISC),
            other => other.parse::<State>().ok(),
        }
    }

    // compact encoding for the dispatcher's atomic snapshot
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            State::OFFLINE => 0,
            State::DISC => 1,
            State::ISS => 2,
            State::IRS => 3,
            State::IRStoISS => 4,
            State::IDLE => 5,
            State::QUIET => 6,
            State::FECSend => 7,
            State::FECRcv => 8,
        }
    }

    pub(crate) fn from_u8(v: u8) -> State {
        match v {
            0 => State::OFFLINE,
            2 => State::ISS,
            3 => State::IRS,
            4 => State::IRStoISS,
            5 => State::IDLE,
            6 => State::QUIET,
            7 => State::FECSend,
            8 => State::FECRcv,
            _ => State::DISC,
        }
    }
}

/// ARQ bandwidth selection
///
/// Renders as `500MAX` (negotiate at most 500 Hz) or
/// `500FORCED` (500 Hz or no connection at all).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Bandwidth {
    hz: u16,
    forced: bool,
}

impl Bandwidth {
    /// Negotiate up to `hz` with the remote peer
    pub fn max(hz: u16) -> Self {
        Bandwidth { hz, forced: false }
    }

    /// Connect at exactly `hz`, or not at all
    pub fn forced(hz: u16) -> Self {
        Bandwidth { hz, forced: true }
    }

    /// Bandwidth, in Hz
    pub fn hz(&self) -> u16 {
        self.hz
    }

    /// True if no lower bandwidth will be negotiated
    pub fn is_forced(&self) -> bool {
        self.forced
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const FORCED: &[&str] = &["MAX", "FORCED"];
        write!(f, "{}{}", self.hz, FORCED[self.forced as usize])
    }
}

impl FromStr for Bandwidth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.bytes().take_while(|c| c.is_ascii_digit()).count();
        let (num, suffix) = s.split_at(digits);
        let hz = num
            .parse::<u16>()
            .map_err(|_e| format!("bad bandwidth \"{}\"", s))?;
        match suffix {
            "MAX" => Ok(Bandwidth::max(hz)),
            "FORCED" => Ok(Bandwidth::forced(hz)),
            _ => Err(format!("bad bandwidth \"{}\"", s)),
        }
    }
}

/// Map a truth value to a TNC string
#[inline]
pub fn truth_str(v: bool) -> &'static str {
    if v {
        TRUE
    } else {
        FALSE
    }
}

/// Parse a TNC truth value
///
/// Accepts `TRUE`/`FALSE` in any case, or `1`/`0`.
pub fn parse_truth(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case(TRUE) || s == "1" {
        Some(true)
    } else if s.eq_ignore_ascii_case(FALSE) || s == "0" {
        Some(false)
    } else {
        None
    }
}
