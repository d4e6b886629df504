//! I/O tasks for the ARDOP TNC

pub mod broadcaster;
pub mod dispatcher;
pub mod reader;
pub mod session;
pub mod writer;
