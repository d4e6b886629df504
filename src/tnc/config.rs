//! TNC driver settings

use std::time::Duration;

/// Default capacity of an ARQ session's inbound buffer, in chunks
pub const DEFAULT_INBOUND_CAPACITY: usize = 4096;

/// Default time the dispatcher waits on a full inbound buffer
pub const DEFAULT_INBOUND_GRACE: Duration = Duration::from_secs(60);

/// Default ARQ timeout programmed into the TNC at open
pub const DEFAULT_ARQ_TIMEOUT: Duration = Duration::from_secs(90);

/// Default limit on unacknowledged outbound bytes
pub const DEFAULT_SEND_HIGH_WATER: u64 = 65535;

/// Driver settings
///
/// Start from `TncConfig::default()` and adjust with the
/// `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TncConfig {
    inbound_capacity: usize,
    inbound_grace: Duration,
    checksum: bool,
    arq_timeout: Duration,
    send_high_water: u64,
}

impl Default for TncConfig {
    fn default() -> Self {
        TncConfig {
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            inbound_grace: DEFAULT_INBOUND_GRACE,
            checksum: false,
            arq_timeout: DEFAULT_ARQ_TIMEOUT,
            send_high_water: DEFAULT_SEND_HIGH_WATER,
        }
    }
}

impl TncConfig {
    /// Inbound buffer capacity, in payload chunks
    ///
    /// Received ARQ payload is buffered here until the
    /// `ArqStream` is read.
    pub fn inbound_capacity(&self) -> usize {
        self.inbound_capacity
    }

    /// Time to wait on a full inbound buffer
    ///
    /// If the application does not drain the inbound buffer
    /// within this period, the session is disconnected.
    pub fn inbound_grace(&self) -> Duration {
        self.inbound_grace
    }

    /// True if single-stream frames carry a CRC-16
    pub fn checksum(&self) -> bool {
        self.checksum
    }

    /// ARQ timeout sent to the TNC at open
    pub fn arq_timeout(&self) -> Duration {
        self.arq_timeout
    }

    /// Unacknowledged bytes above which writes block
    pub fn send_high_water(&self) -> u64 {
        self.send_high_water
    }

    /// Set the inbound buffer capacity (at least one chunk)
    pub fn with_inbound_capacity(mut self, chunks: usize) -> Self {
        self.inbound_capacity = chunks.max(1);
        self
    }

    /// Set the inbound grace period
    pub fn with_inbound_grace(mut self, grace: Duration) -> Self {
        self.inbound_grace = grace;
        self
    }

    /// Enable or disable single-stream checksums
    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    /// Set the ARQ timeout
    pub fn with_arq_timeout(mut self, timeout: Duration) -> Self {
        self.arq_timeout = timeout;
        self
    }

    /// Set the outbound high-water mark (at least one byte)
    pub fn with_send_high_water(mut self, bytes: u64) -> Self {
        self.send_high_water = bytes.max(1);
        self
    }
}
