//! TNC errors

use std::convert::From;
use std::io;
use std::string::String;

use futures::channel::mpsc::{SendError, TrySendError};
use futures::channel::oneshot::Canceled;
use thiserror::Error;

use crate::protocol::constants::CommandID;

/// Errors raised by the `ArdopTnc` interface
#[derive(Debug, Error)]
pub enum TncError {
    /// TNC rejected a command with a `FAULT` message
    #[error("TNC command failed: \"{0}\"")]
    CommandFailed(String),

    /// The TNC interface is closed
    ///
    /// Raised by every operation attempted after `close()`,
    /// and by operations still waiting when the TNC
    /// connection ends.
    #[error("TNC closed")]
    Closed,

    /// A connection is already open or in progress
    ///
    /// Outgoing connections may only be made when the TNC
    /// is idle (`OFFLINE` or `DISC`).
    #[error("Connect already in progress")]
    ConnectInProgress,

    /// The TNC gave up on an outgoing connection
    #[error("Connect timed out")]
    ConnectTimeout,

    /// The TNC closed the control port during open
    ///
    /// The ARDOP TNC serves one host at a time. This usually
    /// means another host is attached to it.
    #[error("TNC control port is busy")]
    ControlPortBusy,

    /// The TNC answered a command with an unusable value
    #[error("Invalid response to {0}")]
    CommandResponseInvalid(CommandID),

    /// Socket connectivity problem
    ///
    /// These errors are generally fatal and indicate serious,
    /// uncorrectable problems with the local ARDOP TNC
    /// connection.
    #[error("IO Error: {0}")]
    IoError(#[from] io::Error),
}

/// Composite `Ok`/`Err` return type
pub type TncResult<T> = Result<T, TncError>;

impl From<SendError> for TncError {
    fn from(_e: SendError) -> Self {
        TncError::Closed
    }
}

impl<T> From<TrySendError<T>> for TncError {
    fn from(_e: TrySendError<T>) -> Self {
        TncError::Closed
    }
}

impl From<Canceled> for TncError {
    fn from(_e: Canceled) -> Self {
        TncError::Closed
    }
}
