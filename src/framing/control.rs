//! Framing for the TNC control protocol
//!
use std::io;
use std::str;
use std::string::String;

use bytes::{BufMut, BytesMut};
use futures_codec::{Decoder, Encoder};

use super::Outbound;
use crate::protocol::constants::NEWLINE;
use crate::protocol::frame::{DecodeError, RawFrame};

/// Frames and sends TNC control messages
pub struct TncControlFraming {}

impl TncControlFraming {
    /// New TNC control message framer
    pub fn new() -> TncControlFraming {
        TncControlFraming {}
    }
}

impl Encoder for TncControlFraming {
    type Item = Outbound;
    type Error = io::Error;

    fn encode(&mut self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Outbound::Command(line) => {
                dst.reserve(line.len() + 1);
                dst.extend_from_slice(line.as_bytes());
                dst.put_u8(NEWLINE);
                Ok(())
            }
            Outbound::Data(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "payload cannot be sent on the control port",
            )),
        }
    }
}

impl Decoder for TncControlFraming {
    type Item = RawFrame;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let end = match src.iter().position(|c| is_line_end(*c)) {
                None => return Ok(None),
                Some(end) => end,
            };

            let line = src.split_to(end + 1);
            let line = &line[..end];
            if line.is_empty() {
                continue;
            }
            return Ok(Some(RawFrame::Line(line_from_bytes(line)?)));
        }
    }
}

#[inline]
pub(super) fn is_line_end(c: u8) -> bool {
    c == NEWLINE || c == b'\n'
}

// Control lines are ASCII. Anything else is a malformed line.
pub(super) fn line_from_bytes(line: &[u8]) -> Result<String, DecodeError> {
    match str::from_utf8(line) {
        Ok(s) => Ok(s.trim_end().to_owned()),
        Err(_e) => Err(DecodeError::Malformed(format!(
            "control line is not text: {:?}",
            line
        ))),
    }
}
