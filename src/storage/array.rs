//! In-memory array source and sink

use crate::protocol::checksum::crc16;
use crate::storage::traits::{SegmentSink, SegmentSource, StorageError};

/// Sends the contents of a byte slice; the name is only carried to the peer
pub struct ArraySource<'a> {
    data: &'a [u8],
    position: usize,
    open: bool,
}

impl<'a> ArraySource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            open: false,
        }
    }
}

impl SegmentSource for ArraySource<'_> {
    fn open_for_read(&mut self, _name: &str) -> Result<u32, StorageError> {
        let length = u32::try_from(self.data.len()).map_err(|_| StorageError::OutOfRange)?;
        self.position = 0;
        self.open = true;
        Ok(length)
    }

    fn read_segment(&mut self, buf: &mut [u8]) -> Result<(), StorageError> {
        if !self.open {
            return Err(StorageError::NotOpen);
        }
        let end = self.position + buf.len();
        let chunk = self.data.get(self.position..end).ok_or(StorageError::OutOfRange)?;
        buf.copy_from_slice(chunk);
        self.position = end;
        Ok(())
    }

    fn seek(&mut self, offset: u32) -> Result<(), StorageError> {
        let offset = offset as usize;
        if offset > self.data.len() {
            return Err(StorageError::OutOfRange);
        }
        self.position = offset;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn compute_crc(&mut self, length: u32) -> Result<u16, StorageError> {
        let content = self.data.get(..length as usize).ok_or(StorageError::OutOfRange)?;
        Ok(crc16(content))
    }
}

/// Receives into a caller-provided buffer
pub struct ArraySink<'a> {
    buf: &'a mut [u8],
    position: usize,
    written: usize,
    open: bool,
}

impl<'a> ArraySink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            position: 0,
            written: 0,
            open: false,
        }
    }

    /// Content written since the last open
    pub fn received(&self) -> &[u8] {
        &self.buf[..self.written]
    }
}

impl SegmentSink for ArraySink<'_> {
    fn open_for_write(&mut self, _name: &str) -> Result<(), StorageError> {
        self.position = 0;
        self.written = 0;
        self.open = true;
        Ok(())
    }

    fn write_segment(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if !self.open {
            return Err(StorageError::NotOpen);
        }
        let end = self.position + data.len();
        let target = self.buf.get_mut(self.position..end).ok_or(StorageError::Full)?;
        target.copy_from_slice(data);
        self.position = end;
        self.written = self.written.max(end);
        Ok(())
    }

    fn seek(&mut self, offset: u32) -> Result<(), StorageError> {
        let offset = offset as usize;
        if offset > self.written {
            return Err(StorageError::OutOfRange);
        }
        self.position = offset;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn compute_crc(&mut self, length: u32) -> Result<u16, StorageError> {
        let length = length as usize;
        if length > self.written {
            return Err(StorageError::OutOfRange);
        }
        Ok(crc16(&self.buf[..length]))
    }

    fn bytes_written(&self) -> u32 {
        self.written as u32
    }
}
