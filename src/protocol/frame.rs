//! Decoded frames and their classification
//!
//! The framers produce `RawFrame`s: a control line or a typed
//! data frame. `Frame::classify()` turns each of them into
//! exactly one of a command/reply, an inbound payload, or a
//! passively heard station.

use std::io;
use std::str;
use std::string::String;

use bytes::Bytes;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{alphanumeric1, char, space0};
use nom::combinator::opt;
use nom::sequence::{delimited, preceded};
use nom::IResult;
use thiserror::Error;

use super::response::{is_call_letters, Response};

/// Errors raised while decoding an inbound stream
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Frame checksum did not verify
    #[error("checksum fault: frame carries {expected:#06x}, computed {computed:#06x}")]
    Checksum { expected: u16, computed: u16 },

    /// Frame could not be parsed
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Transport failure; the stream cannot continue
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// True if decoding may continue after this error
    ///
    /// Checksum and parse faults are handled by asking the
    /// TNC to resend. Transport errors end the stream.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DecodeError::Io(_) => false,
            _ => true,
        }
    }
}

/// Payload type of a data frame
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DataKind {
    /// Connected-mode stream data
    Arq,

    /// Broadcast (connectionless) data
    Fec,

    /// Station identification frame
    Idf,
}

/// A frame as delimited on the wire
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RawFrame {
    /// One control line, without its terminator
    Line(String),

    /// One data frame, without its length and type header
    Data { kind: DataKind, payload: Bytes },
}

/// Represents a data fragment received from the TNC
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DataIn {
    /// ARQ Stream
    ///
    /// ARQ is a streaming connection; there are no
    /// message boundaries. The payload bytes in this
    /// `DataIn` are assumed to immediately follow those
    /// from the previous `DataIn`.
    Arq(Bytes),

    /// FEC Frame
    ///
    /// FEC frames always include a complete message
    Fec(Bytes),
}

/// A classified frame
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Frame {
    /// Reply or notification from the control channel
    Response(Response),

    /// Payload destined for the active session
    Payload(DataIn),

    /// A station identified itself on the air
    Heard { call: String, grid: Option<String> },
}

impl Frame {
    /// Classify a delimited frame
    ///
    /// Every raw frame maps to exactly one `Frame`, or to a
    /// `Malformed` error if its contents cannot be parsed.
    pub fn classify(raw: RawFrame) -> Result<Frame, DecodeError> {
        match raw {
            RawFrame::Line(line) => Ok(Frame::Response(Response::parse(&line)?)),
            RawFrame::Data {
                kind: DataKind::Arq,
                payload,
            } => Ok(Frame::Payload(DataIn::Arq(payload))),
            RawFrame::Data {
                kind: DataKind::Fec,
                payload,
            } => Ok(Frame::Payload(DataIn::Fec(payload))),
            RawFrame::Data {
                kind: DataKind::Idf,
                payload,
            } => {
                let text = str::from_utf8(payload.as_ref()).map_err(|_e| {
                    DecodeError::Malformed("station ID frame is not text".to_owned())
                })?;
                match parse_id_frame(text.trim_end()) {
                    Ok((_rem, (call, grid))) => Ok(Frame::Heard {
                        call: call.to_owned(),
                        grid: grid.map(str::to_owned),
                    }),
                    Err(_e) => Err(DecodeError::Malformed(format!(
                        "unparseable station ID \"{}\"",
                        text
                    ))),
                }
            }
        }
    }
}

// ID:W1AW [EM00]:
fn parse_id_frame(inp: &str) -> IResult<&str, (&str, Option<&str>)> {
    let (rem, _) = tag("ID:")(inp)?;
    let (rem, _) = space0(rem)?;
    let (rem, call) = take_while1(is_call_letters)(rem)?;
    let (rem, grid) = opt(preceded(
        space0,
        delimited(char('['), alphanumeric1, char(']')),
    ))(rem)?;
    Ok((rem, (call, grid)))
}
