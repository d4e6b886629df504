//! TNC Commands
//!
//! All commands are sent from the host to the TNC.
//! Commands are accepted when they are echoed back
//! and rejected by `FAULT` messages. Sending a settable
//! command with no argument queries its current value.

use std::convert::Into;
use std::fmt;
use std::string::String;
use std::time::Duration;

use super::constants::{Bandwidth, CommandID, ProtocolMode};

/// An arbitrary command sent to the TNC
///
/// The `Display` form is the line sent to the TNC, without
/// the line terminator.
pub struct Command<I>
where
    I: fmt::Display,
{
    id: CommandID,
    args: Option<I>,
}

/// Query the current value of a command
///
/// Sends the bare command token. The TNC answers with the
/// token followed by its current value.
pub fn query(id: CommandID) -> Command<arg::NoArg> {
    Command { id, args: None }
}

/// Uncleanly abort the connection
///
/// Immediately aborts an ARQ Connection (dirty disconnect) or a
/// FEC Send session.
pub fn abort() -> Command<arg::NoArg> {
    query(CommandID::ABORT)
}

/// Set ARQ bandwidth
///
/// Sets the maximum negotiated bandwidth or the forced
/// bandwidth. Attempting to change bandwidth while a connection
/// is in process will generate a FAULT.
pub fn arqbw(bw: Bandwidth) -> Command<Bandwidth> {
    Command {
        id: CommandID::ARQBW,
        args: Some(bw),
    }
}

/// Make a new outgoing ARQ connection attempt
///
/// The TNC will attempt to call the given `target`. Acceptance of this
/// command does not imply that the connection has succeeded, merely that
/// the TNC will make the attempt.
///
/// Parameters
/// - `target`: Call sign must be a legitimate call sign,
///   a tactical callsign, or "`CQ`."
/// - `attempts`: Repeat count
pub fn arqcall<S>(target: S, attempts: u16) -> Command<arg::ArqCall>
where
    S: Into<String>,
{
    Command {
        id: CommandID::ARQCALL,
        args: Some(arg::ArqCall {
            target: target.into(),
            attempts,
        }),
    }
}

/// Set ARQ connection timeout
///
/// If no data has flowed in the channel for `timeout` the link
/// is declared dead. The TNC counts whole seconds.
pub fn arqtimeout(timeout: Duration) -> Command<u64> {
    Command {
        id: CommandID::ARQTIMEOUT,
        args: Some(timeout.as_secs()),
    }
}

/// Enable or disable autobreak
///
/// Disables/enables automatic link turnover (BREAK) by IRS when IRS has
/// outbound data pending and ISS reaches IDLE state.
pub fn autobreak(autobreak: bool) -> Command<arg::BoolArg> {
    bool_command(CommandID::AUTOBREAK, autobreak)
}

/// Engage or release the sound card and other TNC resources
pub fn codec(engage: bool) -> Command<arg::BoolArg> {
    bool_command(CommandID::CODEC, engage)
}

/// Ask the TNC to resend the last frame
///
/// Sent whenever an inbound frame fails to decode.
pub fn crcfault() -> Command<arg::NoArg> {
    query(CommandID::CRCFAULT)
}

/// Send CW after ID frames
pub fn cwid(cw: bool) -> Command<arg::BoolArg> {
    bool_command(CommandID::CWID, cw)
}

/// Start disconnect
///
/// Starts an orderly tear-down of an ARQ connection.
/// Disconnection will be confirmed with the remote peer,
/// if possible.
pub fn disconnect() -> Command<arg::NoArg> {
    query(CommandID::DISCONNECT)
}

/// Set your station's grid square
///
/// Sets the 4, 6, or 8-character Maidenhead Grid Square for your
/// station. Your grid square will be sent in ID frames.
pub fn gridsquare<S>(grid: S) -> Command<String>
where
    S: Into<String>,
{
    Command {
        id: CommandID::GRIDSQUARE,
        args: Some(grid.into()),
    }
}

/// Clears any pending queued values in the TNC interface
///
/// All new connections to the TNC should start with this command.
pub fn initialize() -> Command<arg::NoArg> {
    query(CommandID::INITIALIZE)
}

/// Listen for incoming connections
///
/// Enables/disables the TNC's response to an ARQ connect request to
/// `MYCALL` or any of `MYAUX` call signs.
pub fn listen(listen: bool) -> Command<arg::BoolArg> {
    bool_command(CommandID::LISTEN, listen)
}

/// Set your station's auxiliary callsigns
///
/// `MYAUX` is only used for `LISTEN`ing, and it will not be used for
/// connect requests. If `aux` is empty, all aux callsigns are removed.
pub fn myaux(aux: Vec<String>) -> Command<arg::MyAux> {
    Command {
        id: CommandID::MYAUX,
        args: Some(arg::MyAux { aux }),
    }
}

/// Set your station's callsign
///
/// Sets current call sign. If not a valid call generates a FAULT.
pub fn mycall<S>(callsign: S) -> Command<String>
where
    S: Into<String>,
{
    Command {
        id: CommandID::MYCALL,
        args: Some(callsign.into()),
    }
}

/// Set protocol mode
pub fn protocolmode(mode: ProtocolMode) -> Command<ProtocolMode> {
    Command {
        id: CommandID::PROTOCOLMODE,
        args: Some(mode),
    }
}

/// Send ID frame
///
/// Sends an ID frame immediately, followed by a CW ID (if `CWID` is set)
pub fn sendid() -> Command<arg::NoArg> {
    query(CommandID::SENDID)
}

fn bool_command(id: CommandID, arg: bool) -> Command<arg::BoolArg> {
    Command {
        id,
        args: Some(arg::BoolArg { arg }),
    }
}

impl<I> Command<I>
where
    I: fmt::Display,
{
    /// Command identifier
    pub fn command_id(&self) -> CommandID {
        self.id
    }
}

impl<I> fmt::Display for Command<I>
where
    I: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.args {
            None => write!(f, "{}", self.id),
            Some(x) => write!(f, "{} {}", self.id, x),
        }
    }
}

pub mod arg {
    //! Argument encodings

    use super::super::constants as C;

    use std::fmt;
    use std::string::String;

    /// No arguments
    pub struct NoArg {}

    impl fmt::Display for NoArg {
        fn fmt(&self, _f: &mut fmt::Formatter) -> fmt::Result {
            Ok(())
        }
    }

    /// A single boolean argument
    pub struct BoolArg {
        pub(super) arg: bool,
    }

    impl fmt::Display for BoolArg {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{}", C::truth_str(self.arg))
        }
    }

    /// Outgoing ARQ connection attempt
    pub struct ArqCall {
        pub(super) target: String,
        pub(super) attempts: u16,
    }

    impl fmt::Display for ArqCall {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{} {}", self.target, self.attempts)
        }
    }

    /// Auxiliary callsign(s)
    pub struct MyAux {
        pub(super) aux: Vec<String>,
    }

    impl fmt::Display for MyAux {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            if self.aux.is_empty() {
                write!(f, "X")
            } else {
                write!(f, "{}", self.aux.join(","))
            }
        }
    }
}
