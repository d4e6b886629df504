//! An Async Rust host driver for the ARDOP TNC
//!
//! The TNC is driven over its control port, plus either a
//! separate data port or a single stream which multiplexes
//! both. See the [tnc](tnc/index.html) module to get started.

#![recursion_limit = "256"]
#[allow(unused_imports)]
#[macro_use]
extern crate custom_derive;
#[macro_use]
extern crate enum_derive;
#[macro_use]
extern crate futures;
#[macro_use]
extern crate log;

pub mod arq;
pub mod tnc;

mod framing;
mod protocol;
mod tncio;

pub use protocol::constants::{Bandwidth, CommandID, ProtocolMode, State};
pub use protocol::response::{ConnectedPeer, RejectReason, Response};
