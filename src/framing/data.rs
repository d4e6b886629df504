//! Framing for the TNC data protocol
//!
use std::cmp::min;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use futures_codec::{Decoder, Encoder};
use nom::bytes::streaming::take;
use nom::number::streaming::be_u16;
use nom::sequence::tuple;
use nom::IResult;

use super::Outbound;
use crate::protocol::frame::{DataKind, DecodeError, RawFrame};

// length prefix + type tag
const HEADER_LEN: usize = 5;
const TAG_LEN: usize = 3;

/// Frames and sends TNC data messages
pub struct TncDataFraming {}

impl TncDataFraming {
    /// New TNC data message framer
    pub fn new() -> TncDataFraming {
        TncDataFraming {}
    }
}

impl Encoder for TncDataFraming {
    type Item = Outbound;
    type Error = io::Error;

    fn encode(&mut self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Outbound::Data(data) => {
                encode_payload(&data, dst, |chunk, dst| dst.extend_from_slice(chunk));
                Ok(())
            }
            Outbound::Command(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "commands cannot be sent on the data port",
            )),
        }
    }
}

impl Decoder for TncDataFraming {
    type Item = RawFrame;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let (len, tag) = match parse_header(src.as_ref()) {
                Ok((_rem, (len, tag))) => (len as usize, data_kind(tag)),
                Err(_incomplete) => return Ok(None),
            };
            if len < TAG_LEN {
                let _ = src.split_to(2 + len);
                return Err(DecodeError::Malformed(format!(
                    "data frame too short: {} bytes",
                    len
                )));
            }
            if src.len() < 2 + len {
                src.reserve(2 + len - src.len());
                return Ok(None);
            }

            let mut frame = src.split_to(2 + len);
            let payload = frame.split_off(HEADER_LEN).freeze();
            match tag {
                Ok(Some(kind)) => return Ok(Some(RawFrame::Data { kind, payload })),
                Ok(None) => {
                    // ERR frames are discarded
                    trace!("<-- ERR frame, {} bytes", payload.len());
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// Splits outbound payload into u16-prefixed chunks. `write`
// places each chunk (prefix included) into `dst`.
pub(super) fn encode_payload<F>(data: &Bytes, dst: &mut BytesMut, mut write: F)
where
    F: FnMut(&[u8], &mut BytesMut),
{
    // data is prefixed with a big endian size
    //
    // if we have more than 2**16 bytes to send, we need to split it up
    // into blocks for the TNC.
    let mut pos = 0usize;
    while pos < data.len() {
        let remain = data.len() - pos;
        let chunk_size = min(remain, u16::max_value() as usize);
        let mut chunk = BytesMut::with_capacity(chunk_size + 2);
        chunk.put_u16(chunk_size as u16);
        chunk.extend_from_slice(&data.as_ref()[pos..pos + chunk_size]);
        write(chunk.as_ref(), dst);

        pos += chunk_size;
    }
}

// Data frame header: big-endian length, then a type tag
pub(super) fn parse_header(inp: &[u8]) -> IResult<&[u8], (u16, &[u8])> {
    tuple((be_u16, take(TAG_LEN)))(inp)
}

// Maps a type tag to a frame kind. `ERR` frames map to None.
pub(super) fn data_kind(tag: &[u8]) -> Result<Option<DataKind>, DecodeError> {
    match tag {
        b"ARQ" => Ok(Some(DataKind::Arq)),
        b"FEC" => Ok(Some(DataKind::Fec)),
        b"IDF" => Ok(Some(DataKind::Idf)),
        b"ERR" => Ok(None),
        _ => Err(DecodeError::Malformed(format!(
            "unknown data frame type {:?}",
            String::from_utf8_lossy(tag)
        ))),
    }
}
