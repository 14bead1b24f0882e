//! Segment storage traits
//!
//! The sender reads content through a [`SegmentSource`] and the receiver
//! writes it through a [`SegmentSink`]. Both are sequential with seek, so a
//! file, an in-memory array or a simulated store can sit behind the same
//! transfer state machines.

/// Errors that can occur during storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Named content does not exist
    NotFound,
    /// Name is empty, too long or not allowed by the store
    InvalidName,
    /// Operation needs an open source or sink
    NotOpen,
    /// Sink has no room for the write
    Full,
    /// Read, seek or CRC range past the end of the content
    OutOfRange,
    /// Underlying device error
    Io,
}

/// Content the sender reads segments from
pub trait SegmentSource {
    /// Open the named content for reading from offset 0
    ///
    /// Returns the content length; 0 means there is nothing to send.
    fn open_for_read(&mut self, name: &str) -> Result<u32, StorageError>;

    /// Fill `buf` from the current offset and advance past it
    fn read_segment(&mut self, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Move the read offset
    fn seek(&mut self, offset: u32) -> Result<(), StorageError>;

    fn close(&mut self);

    /// CRC of the first `length` bytes
    ///
    /// May move the read offset; callers seek before reading again.
    fn compute_crc(&mut self, length: u32) -> Result<u16, StorageError>;
}

/// Destination the receiver writes segments to
pub trait SegmentSink {
    /// Create or truncate the named destination, write offset 0
    fn open_for_write(&mut self, name: &str) -> Result<(), StorageError>;

    /// Write `data` at the current offset and advance past it
    fn write_segment(&mut self, data: &[u8]) -> Result<(), StorageError>;

    /// Move the write offset
    fn seek(&mut self, offset: u32) -> Result<(), StorageError>;

    fn close(&mut self);

    /// CRC of the first `length` bytes written
    fn compute_crc(&mut self, length: u32) -> Result<u16, StorageError>;

    /// Length of the content written since open
    fn bytes_written(&self) -> u32;
}
