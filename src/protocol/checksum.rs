//! CRC-16-CCITT used for frame payloads and whole-content integrity
//!
//! Polynomial 0x1021, initial value 0xFFFF, no reflection and no final XOR
//! (catalogued as CRC-16/IBM-3740).

use crc::{Crc, Digest, CRC_16_IBM_3740};

/// Shared CRC engine
pub static CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Calculate the CRC of a byte range in one pass
pub fn crc16(data: &[u8]) -> u16 {
    CCITT.checksum(data)
}

/// Incremental CRC for content read or written in pieces
pub struct Crc16 {
    digest: Digest<'static, u16>,
}

impl Crc16 {
    pub fn new() -> Self {
        Self {
            digest: CCITT.digest(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Return the CRC of everything seen so far and start again from empty
    pub fn take(&mut self) -> u16 {
        core::mem::replace(&mut self.digest, CCITT.digest()).finalize()
    }

    pub fn finish(self) -> u16 {
        self.digest.finalize()
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}
