//! ARDOP host protocol
//!
//! Wire tokens, outbound commands, and the decoding of
//! inbound control lines and data frames.

pub mod command;
pub mod constants;
pub mod frame;
pub mod response;
