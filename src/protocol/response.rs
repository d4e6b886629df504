//! Control lines received from the TNC
//!
//! Every line the TNC sends on its control channel begins with a
//! command token. Replies to host requests echo the token of the
//! request (optionally followed by `now` and the new value). The
//! remaining lines are unsolicited notifications. Both kinds are
//! decoded here into a single tagged `Response`, with the argument
//! text parsed into a strongly-typed value for each token.

use std::fmt;
use std::str;
use std::string::String;

use nom::bytes::complete::take_while1;
use nom::character::complete::{alphanumeric1, digit1, space0, space1};
use nom::combinator::{all_consuming, map_res, opt};
use nom::sequence::{preceded, tuple};
use nom::IResult;

use super::constants::{parse_truth, Bandwidth, CommandID, ProtocolMode, State};
use super::frame::DecodeError;

/// Reasons a remote peer will reject a connection
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RejectReason {
    /// Peer is busy with an existing connection
    Busy,

    /// Bandwidth negotiation failed
    IncompatibleBandwidth,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RejectReason::Busy => write!(f, "rejected by peer: busy"),
            RejectReason::IncompatibleBandwidth => {
                write!(f, "rejected by peer: incompatible bandwidth")
            }
        }
    }
}

/// Peer announced by a `CONNECTED` line
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ConnectedPeer {
    /// Remote call sign. This *should* be a proper callsign.
    pub call: String,

    /// Connection bandwidth, in Hz
    pub bandwidth: u16,

    /// Maidenhead grid square of remote peer, if known
    pub grid: Option<String>,
}

/// A decoded control line
///
/// Variants for settable parameters carry an `Option`: the
/// TNC may acknowledge a set with a bare token, but answers
/// a query with the current value.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Response {
    /// Abort acknowledged
    Abort,

    /// ARQ bandwidth
    ArqBw(Option<Bandwidth>),

    /// Outgoing call acknowledged
    ArqCall(Option<String>),

    /// ARQ timeout, in seconds
    ArqTimeout(Option<u64>),

    /// Automatic link turnover enabled
    AutoBreak(Option<bool>),

    /// Bytes of outbound payload not yet acknowledged by the peer
    Buffer(u64),

    /// The RF channel has become busy (or not)
    Busy(bool),

    /// Prior `PENDING` was not for this station
    CancelPending,

    /// Sound card engaged
    Codec(Option<bool>),

    /// An ARQ connection is open
    Connected(ConnectedPeer),

    /// The TNC asks for retransmission of our last frame
    CrcFault,

    /// CW ID after ID frames
    CwId(Option<bool>),

    /// Disconnect acknowledged; teardown in progress
    Disconnect,

    /// An existing ARQ link has been disconnected
    Disconnected,

    /// A request was rejected, with the TNC's explanation
    Fault(String),

    /// Our grid square
    GridSquare(Option<String>),

    /// Initialize acknowledged
    Initialize,

    /// Incoming connections are answered
    Listen(Option<bool>),

    /// Auxiliary callsigns
    MyAux(Option<Vec<String>>),

    /// Our callsign
    MyCall(Option<String>),

    /// The TNC has transitioned to the given State
    NewState(State),

    /// A connect request or ping frame has been detected
    Pending,

    /// Current protocol mode
    ProtocolMode(Option<ProtocolMode>),

    /// Key (or unkey) the transmitter
    Ptt(bool),

    /// Connection rejected by peer
    Rejected(RejectReason),

    /// ID frame queued for transmission
    SendId,

    /// Current TNC state, in reply to a query
    State(State),

    /// A textual status message for the user
    Status(String),

    /// Callsign dialed by an incoming caller
    Target(String),

    /// TNC software version
    Version(String),

    /// A line with an unrecognized token
    Unknown(String),
}

impl Response {
    /// Decode one control line
    ///
    /// The line must not include its terminator. Unrecognized
    /// tokens decode to `Response::Unknown`. A recognized token
    /// whose argument cannot be parsed is a `Malformed` error.
    pub fn parse(line: &str) -> Result<Response, DecodeError> {
        let (token, args) = match split_command(line) {
            Ok((_rem, out)) => out,
            Err(_e) => return Ok(Response::Unknown(line.to_owned())),
        };

        // REJECTEDBW and REJECTEDBUSY carry their reason in the token
        if let Some(reason) = token.strip_prefix("REJECTED") {
            let reason = if reason.is_empty() { args } else { reason };
            return parse_rejection_reason(reason)
                .map(Response::Rejected)
                .ok_or_else(|| malformed(line));
        }

        let id = match token.parse::<CommandID>() {
            Ok(id) => id,
            Err(_e) => return Ok(Response::Unknown(line.to_owned())),
        };
        let args = if is_settable(id) { strip_now(args) } else { args };

        let out = match id {
            CommandID::ABORT => Response::Abort,
            CommandID::ARQBW => Response::ArqBw(opt_arg(args, |a| a.parse().ok(), line)?),
            CommandID::ARQCALL => Response::ArqCall(opt_string(args)),
            CommandID::ARQTIMEOUT => {
                Response::ArqTimeout(opt_arg(args, |a| a.parse().ok(), line)?)
            }
            CommandID::AUTOBREAK => Response::AutoBreak(opt_arg(args, parse_truth, line)?),
            CommandID::BUFFER => Response::Buffer(args.parse().map_err(|_e| malformed(line))?),
            CommandID::BUSY => Response::Busy(parse_truth(args).ok_or_else(|| malformed(line))?),
            CommandID::CANCELPENDING => Response::CancelPending,
            CommandID::CODEC => Response::Codec(opt_arg(args, parse_truth, line)?),
            CommandID::CONNECTED => match all_consuming(parse_connected)(args) {
                Ok((_rem, peer)) => Response::Connected(peer),
                Err(_e) => return Err(malformed(line)),
            },
            CommandID::CRCFAULT => Response::CrcFault,
            CommandID::CWID => Response::CwId(opt_arg(args, parse_truth, line)?),
            CommandID::DISCONNECT => Response::Disconnect,
            CommandID::DISCONNECTED => Response::Disconnected,
            CommandID::FAULT => Response::Fault(args.to_owned()),
            CommandID::GRIDSQUARE => Response::GridSquare(opt_string(args)),
            CommandID::INITIALIZE => Response::Initialize,
            CommandID::LISTEN => Response::Listen(opt_arg(args, parse_truth, line)?),
            CommandID::MYAUX => Response::MyAux(parse_aux(args)),
            CommandID::MYCALL => Response::MyCall(opt_string(args)),
            CommandID::NEWSTATE => {
                Response::NewState(State::from_token(args).ok_or_else(|| malformed(line))?)
            }
            CommandID::PENDING => Response::Pending,
            CommandID::PROTOCOLMODE => {
                Response::ProtocolMode(opt_arg(args, |a| a.parse().ok(), line)?)
            }
            CommandID::PTT => Response::Ptt(parse_truth(args).ok_or_else(|| malformed(line))?),
            CommandID::REJECTED => return Err(malformed(line)),
            CommandID::SENDID => Response::SendId,
            CommandID::STATE => {
                Response::State(State::from_token(args).ok_or_else(|| malformed(line))?)
            }
            CommandID::STATUS => Response::Status(args.to_owned()),
            CommandID::TARGET => Response::Target(args.to_owned()),
            CommandID::VERSION => Response::Version(args.to_owned()),
        };
        Ok(out)
    }

    /// Command token carried by this line
    ///
    /// Returns `None` for `Response::Unknown`.
    pub fn command_id(&self) -> Option<CommandID> {
        let id = match self {
            Response::Abort => CommandID::ABORT,
            Response::ArqBw(_) => CommandID::ARQBW,
            Response::ArqCall(_) => CommandID::ARQCALL,
            Response::ArqTimeout(_) => CommandID::ARQTIMEOUT,
            Response::AutoBreak(_) => CommandID::AUTOBREAK,
            Response::Buffer(_) => CommandID::BUFFER,
            Response::Busy(_) => CommandID::BUSY,
            Response::CancelPending => CommandID::CANCELPENDING,
            Response::Codec(_) => CommandID::CODEC,
            Response::Connected(_) => CommandID::CONNECTED,
            Response::CrcFault => CommandID::CRCFAULT,
            Response::CwId(_) => CommandID::CWID,
            Response::Disconnect => CommandID::DISCONNECT,
            Response::Disconnected => CommandID::DISCONNECTED,
            Response::Fault(_) => CommandID::FAULT,
            Response::GridSquare(_) => CommandID::GRIDSQUARE,
            Response::Initialize => CommandID::INITIALIZE,
            Response::Listen(_) => CommandID::LISTEN,
            Response::MyAux(_) => CommandID::MYAUX,
            Response::MyCall(_) => CommandID::MYCALL,
            Response::NewState(_) => CommandID::NEWSTATE,
            Response::Pending => CommandID::PENDING,
            Response::ProtocolMode(_) => CommandID::PROTOCOLMODE,
            Response::Ptt(_) => CommandID::PTT,
            Response::Rejected(_) => CommandID::REJECTED,
            Response::SendId => CommandID::SENDID,
            Response::State(_) => CommandID::STATE,
            Response::Status(_) => CommandID::STATUS,
            Response::Target(_) => CommandID::TARGET,
            Response::Version(_) => CommandID::VERSION,
            Response::Unknown(_) => return None,
        };
        Some(id)
    }
}

// Splits a line into its command token and argument text
fn split_command(line: &str) -> IResult<&str, (&str, &str)> {
    let (args, token) = take_while1(|c: char| c.is_ascii_alphanumeric())(line)?;
    let (args, _) = space0(args)?;
    Ok(("", (token, args.trim_end())))
}

// Tokens whose set acknowledgements read "TOKEN now VALUE"
fn is_settable(id: CommandID) -> bool {
    match id {
        CommandID::ARQBW
        | CommandID::ARQTIMEOUT
        | CommandID::AUTOBREAK
        | CommandID::CODEC
        | CommandID::CWID
        | CommandID::GRIDSQUARE
        | CommandID::LISTEN
        | CommandID::MYAUX
        | CommandID::MYCALL
        | CommandID::PROTOCOLMODE => true,
        _ => false,
    }
}

fn strip_now(args: &str) -> &str {
    let mut words = args.splitn(2, ' ');
    match words.next() {
        Some(first) if first.eq_ignore_ascii_case("now") => {
            words.next().unwrap_or("").trim_start()
        }
        _ => args,
    }
}

fn opt_string(args: &str) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.to_owned())
    }
}

fn opt_arg<T, F>(args: &str, parse: F, line: &str) -> Result<Option<T>, DecodeError>
where
    F: Fn(&str) -> Option<T>,
{
    if args.is_empty() {
        Ok(None)
    } else {
        parse(args).map(Some).ok_or_else(|| malformed(line))
    }
}

fn parse_aux(args: &str) -> Option<Vec<String>> {
    if args.is_empty() {
        return None;
    }
    Some(
        args.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}

fn parse_rejection_reason(reason: &str) -> Option<RejectReason> {
    match reason.trim() {
        "BW" => Some(RejectReason::IncompatibleBandwidth),
        "BUSY" => Some(RejectReason::Busy),
        _ => None,
    }
}

// CONNECTED W1AW-Z 500 EM00
fn parse_connected(inp: &str) -> IResult<&str, ConnectedPeer> {
    let (rem, (call, _, bandwidth, grid)) = tuple((
        take_while1(is_call_letters),
        space1,
        map_res(digit1, str::parse::<u16>),
        opt(preceded(space1, alphanumeric1)),
    ))(inp)?;
    Ok((
        rem,
        ConnectedPeer {
            call: call.to_owned(),
            bandwidth,
            grid: grid.map(str::to_owned),
        },
    ))
}

#[inline]
pub(crate) fn is_call_letters(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

fn malformed(line: &str) -> DecodeError {
    DecodeError::Malformed(format!("unparseable control line \"{}\"", line))
}
