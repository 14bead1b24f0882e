//! Simulated storage for link testing without a card or a buffer
//!
//! [`SimulatedSource`] generates a fixed-length byte pattern and
//! [`NullSink`] discards what it receives, keeping only its length and CRC.
//! Together they exercise the full protocol with nothing stored.

use crate::protocol::checksum::Crc16;
use crate::storage::traits::{SegmentSink, SegmentSource, StorageError};

/// Generated content byte at `offset`
pub fn pattern_byte(offset: u32) -> u8 {
    (offset % 251) as u8
}

/// Source of `length` generated bytes
pub struct SimulatedSource {
    length: u32,
    position: u32,
    open: bool,
}

impl SimulatedSource {
    pub fn new(length: u32) -> Self {
        Self {
            length,
            position: 0,
            open: false,
        }
    }
}

impl SegmentSource for SimulatedSource {
    fn open_for_read(&mut self, _name: &str) -> Result<u32, StorageError> {
        self.position = 0;
        self.open = true;
        Ok(self.length)
    }

    fn read_segment(&mut self, buf: &mut [u8]) -> Result<(), StorageError> {
        if !self.open {
            return Err(StorageError::NotOpen);
        }
        let end = self.position as u64 + buf.len() as u64;
        if end > self.length as u64 {
            return Err(StorageError::OutOfRange);
        }
        for (offset, byte) in (self.position..).zip(buf.iter_mut()) {
            *byte = pattern_byte(offset);
        }
        self.position = end as u32;
        Ok(())
    }

    fn seek(&mut self, offset: u32) -> Result<(), StorageError> {
        if offset > self.length {
            return Err(StorageError::OutOfRange);
        }
        self.position = offset;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn compute_crc(&mut self, length: u32) -> Result<u16, StorageError> {
        if length > self.length {
            return Err(StorageError::OutOfRange);
        }

        let mut crc = Crc16::new();
        let mut chunk = [0u8; 64];
        let mut offset = 0;
        while offset < length {
            let n = (length - offset).min(chunk.len() as u32);
            for (i, byte) in chunk[..n as usize].iter_mut().enumerate() {
                *byte = pattern_byte(offset + i as u32);
            }
            crc.update(&chunk[..n as usize]);
            offset += n;
        }
        Ok(crc.finish())
    }
}

/// Sink that keeps only the length and running CRC of its content
///
/// Writes must be sequential; it cannot rewind over bytes it has dropped.
pub struct NullSink {
    written: u32,
    crc: Crc16,
    final_crc: Option<u16>,
    open: bool,
}

impl NullSink {
    pub fn new() -> Self {
        Self {
            written: 0,
            crc: Crc16::new(),
            final_crc: None,
            open: false,
        }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentSink for NullSink {
    fn open_for_write(&mut self, _name: &str) -> Result<(), StorageError> {
        self.written = 0;
        self.crc = Crc16::new();
        self.final_crc = None;
        self.open = true;
        Ok(())
    }

    fn write_segment(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if !self.open {
            return Err(StorageError::NotOpen);
        }
        if self.final_crc.is_some() {
            return Err(StorageError::OutOfRange);
        }
        self.crc.update(data);
        self.written += data.len() as u32;
        Ok(())
    }

    fn seek(&mut self, offset: u32) -> Result<(), StorageError> {
        // Only the current end can be sought
        if offset != self.written {
            return Err(StorageError::OutOfRange);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn compute_crc(&mut self, length: u32) -> Result<u16, StorageError> {
        if length != self.written {
            return Err(StorageError::OutOfRange);
        }
        let crc = match self.final_crc {
            Some(crc) => crc,
            None => self.crc.take(),
        };
        self.final_crc = Some(crc);
        Ok(crc)
    }

    fn bytes_written(&self) -> u32 {
        self.written
    }
}
