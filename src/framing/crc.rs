//! Frame checksum for single-stream transports
//!
//! CRC-16/CCITT-FALSE: polynomial 0x1021, initial value
//! 0xFFFF, no reflection, no final XOR. Transmitted big-endian
//! after the frame body.

use crc::{Crc, CRC_16_IBM_3740};

const CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Checksum `data`
pub fn crc16(data: &[u8]) -> u16 {
    CCITT.checksum(data)
}
