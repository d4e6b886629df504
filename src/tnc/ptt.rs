//! Transmitter keying

use std::io;

/// Keys and unkeys the radio's transmitter
///
/// When the TNC wants to transmit, it sends `PTT TRUE` and
/// expects the host to key the radio. `PTT FALSE` follows
/// once transmission ends. Any closure of the form
/// `FnMut(bool) -> io::Result<()>` is a `PttController`.
pub trait PttController: Send {
    /// Key (`true`) or unkey (`false`) the transmitter
    fn set_ptt(&mut self, transmit: bool) -> io::Result<()>;
}

impl<F> PttController for F
where
    F: FnMut(bool) -> io::Result<()> + Send,
{
    fn set_ptt(&mut self, transmit: bool) -> io::Result<()> {
        self(transmit)
    }
}
