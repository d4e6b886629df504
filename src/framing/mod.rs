//! Wire framing for the TNC transports
//!
//! The TNC is reached either over two sockets (a line-oriented
//! control port and a length-prefixed data port) or over one
//! multiplexed stream. Each has a `futures_codec` codec here.

use std::string::String;

use bytes::Bytes;

pub mod combined;
pub mod control;
pub mod crc;
pub mod data;

/// Outbound traffic for the writer task
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Outbound {
    /// A command line, without its terminator
    Command(String),

    /// ARQ payload for the connected peer
    Data(Bytes),
}

impl Outbound {
    /// True if this is payload rather than a command
    pub fn is_data(&self) -> bool {
        match self {
            Outbound::Data(_) => true,
            Outbound::Command(_) => false,
        }
    }
}
