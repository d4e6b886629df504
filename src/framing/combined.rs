//! Framing for single-stream TNC transports
//!
//! Some transports (serial links, for instance) carry control
//! and data over one byte stream. Each frame is prefixed with
//! `c:` (a control line) or `d:` (a data frame). When checksums
//! are enabled, every frame body is followed by a big-endian
//! CRC-16 computed over everything after the prefix.

use std::io;

use bytes::{BufMut, BytesMut};
use futures_codec::{Decoder, Encoder};

use super::control::{is_line_end, line_from_bytes};
use super::crc::crc16;
use super::data::{data_kind, encode_payload, parse_header};
use super::Outbound;
use crate::protocol::constants::NEWLINE;
use crate::protocol::frame::{DecodeError, RawFrame};

const PREFIX_CONTROL: &[u8] = b"c:";
const PREFIX_DATA: &[u8] = b"d:";
const PREFIX_LEN: usize = 2;
const CRC_LEN: usize = 2;

/// Frames and sends multiplexed TNC control and data messages
pub struct TncCombinedFraming {
    checksum: bool,
}

impl TncCombinedFraming {
    /// New multiplexed framer
    ///
    /// If `checksum` is true, every frame carries a CRC-16.
    pub fn new(checksum: bool) -> TncCombinedFraming {
        TncCombinedFraming { checksum }
    }

    fn trailer_len(&self) -> usize {
        if self.checksum {
            CRC_LEN
        } else {
            0
        }
    }

    // Removes a complete frame of `body_len` bytes (after the
    // prefix) from `src` and verifies its checksum
    fn take_body(&self, src: &mut BytesMut, body_len: usize) -> Result<BytesMut, DecodeError> {
        let mut frame = src.split_to(PREFIX_LEN + body_len + self.trailer_len());
        let mut body = frame.split_off(PREFIX_LEN);
        if self.checksum {
            let trailer = body.split_off(body_len);
            let expected = u16::from_be_bytes([trailer[0], trailer[1]]);
            let computed = crc16(body.as_ref());
            if expected != computed {
                return Err(DecodeError::Checksum { expected, computed });
            }
        }
        Ok(body)
    }

    fn put_trailer(&self, body: &[u8], dst: &mut BytesMut) {
        if self.checksum {
            dst.put_u16(crc16(body));
        }
    }
}

impl Encoder for TncCombinedFraming {
    type Item = Outbound;
    type Error = io::Error;

    fn encode(&mut self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Outbound::Command(line) => {
                let mut body = BytesMut::with_capacity(line.len() + 1);
                body.extend_from_slice(line.as_bytes());
                body.put_u8(NEWLINE);

                dst.extend_from_slice(PREFIX_CONTROL);
                dst.extend_from_slice(body.as_ref());
                self.put_trailer(body.as_ref(), dst);
            }
            Outbound::Data(data) => {
                encode_payload(&data, dst, |chunk, dst| {
                    dst.extend_from_slice(PREFIX_DATA);
                    dst.extend_from_slice(chunk);
                    self.put_trailer(chunk, dst);
                });
            }
        }
        Ok(())
    }
}

impl Decoder for TncCombinedFraming {
    type Item = RawFrame;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < PREFIX_LEN {
                return Ok(None);
            }

            // resynchronize on the next frame prefix
            if !has_prefix(src.as_ref()) {
                let skip = match find_prefix(src.as_ref()) {
                    Some(pos) => pos,
                    None => src.len() - 1,
                };
                let _ = src.split_to(skip);
                return Err(DecodeError::Malformed(format!(
                    "discarded {} bytes of unframed input",
                    skip
                )));
            }

            if src.starts_with(PREFIX_CONTROL) {
                let end = match src[PREFIX_LEN..].iter().position(|c| is_line_end(*c)) {
                    None => return Ok(None),
                    Some(end) => end,
                };
                let body_len = end + 1;
                if src.len() < PREFIX_LEN + body_len + self.trailer_len() {
                    return Ok(None);
                }
                let body = self.take_body(src, body_len)?;
                let line = &body[..end];
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(RawFrame::Line(line_from_bytes(line)?)));
            } else {
                let (len, tag) = match parse_header(&src[PREFIX_LEN..]) {
                    Ok((_rem, (len, tag))) => (len as usize, data_kind(tag)),
                    Err(_incomplete) => return Ok(None),
                };
                let body_len = 2 + len;
                if src.len() < PREFIX_LEN + body_len + self.trailer_len() {
                    src.reserve(PREFIX_LEN + body_len + self.trailer_len() - src.len());
                    return Ok(None);
                }
                let mut body = self.take_body(src, body_len)?;
                if len < 3 {
                    return Err(DecodeError::Malformed(format!(
                        "data frame too short: {} bytes",
                        len
                    )));
                }
                let payload = body.split_off(5).freeze();
                match tag? {
                    Some(kind) => return Ok(Some(RawFrame::Data { kind, payload })),
                    None => {
                        trace!("<-- ERR frame, {} bytes", payload.len());
                        continue;
                    }
                }
            }
        }
    }
}

fn has_prefix(buf: &[u8]) -> bool {
    buf.starts_with(PREFIX_CONTROL) || buf.starts_with(PREFIX_DATA)
}

fn find_prefix(buf: &[u8]) -> Option<usize> {
    buf.windows(PREFIX_LEN).position(has_prefix)
}
