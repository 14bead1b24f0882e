//! Transfer errors and the session error mask

use crate::storage::traits::StorageError;
use crate::transfer::descriptor::DescriptorError;
use crate::transfer::traits::LinkError;

/// Accumulated error bits of a session
///
/// A failed `send_file` may set several bits: the cause and the phase it
/// failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorFlags(u16);

impl ErrorFlags {
    pub const NO_FILE_SAVE: Self = Self(1 << 0);
    pub const NOTHING_TO_SEND: Self = Self(1 << 1);
    pub const SEND_FILE: Self = Self(1 << 2);
    pub const NO_ACK_LIMIT: Self = Self(1 << 3);
    pub const SEND_PACKET: Self = Self(1 << 4);
    pub const LENGTH_MISMATCH: Self = Self(1 << 5);
    pub const CRC_MISMATCH: Self = Self(1 << 6);
    pub const START_NACK: Self = Self(1 << 7);
    pub const REMOTE_OPEN: Self = Self(1 << 8);
    pub const START_TRANSFER: Self = Self(1 << 11);
    pub const SEND_SEGMENTS: Self = Self(1 << 12);
    pub const SEND_SEGMENT: Self = Self(1 << 13);
    pub const OPENING_FILE: Self = Self(1 << 14);
    pub const END_TRANSFER: Self = Self(1 << 15);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// Errors that end a transfer attempt or a receive loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// Transfer settings cannot drive a transfer
    InvalidConfig,
    /// Source is empty
    NothingToSend,
    /// Name is empty, too long or not valid UTF-8
    InvalidName,
    /// Content needs more segments than can be numbered
    TooLarge,
    /// Local storage failure
    Storage(StorageError),
    /// Missed acknowledgements exceeded the per-attempt limit
    NoAckLimit,
    /// Open went unacknowledged for every send attempt
    OpenFailed,
    /// Receiver could not open its destination
    RemoteOpenFailed,
    /// One segment went unacknowledged for every send attempt
    SegmentFailed { segment: u16 },
    /// Receiver had no transfer open (Start-NACK)
    RestartRequested,
    /// Segment-NACK asked to resume past the end of the content
    BadResumePoint { segment: u16 },
    /// Segment-NACK resyncs exceeded the per-attempt limit
    ResyncLimit,
    /// Close went unacknowledged for every send attempt
    CloseFailed,
    /// Receiver wrote a different number of bytes
    LengthMismatch { local: u32, remote: u32 },
    /// Receiver computed a different content CRC
    CrcMismatch { local: u16, remote: u16 },
    /// Info exchange failed
    InfoFailed,
    /// Receive loop saw no packet before its timeout
    ReceiveTimeout,
    /// Receive loop hit its limit of consecutive bad frames
    Link(LinkError),
}

impl TransferError {
    /// Error mask bits this error sets
    pub fn flags(&self) -> ErrorFlags {
        match self {
            Self::InvalidConfig | Self::ReceiveTimeout | Self::Link(_) => ErrorFlags::empty(),
            Self::NothingToSend | Self::InvalidName | Self::TooLarge => ErrorFlags::NOTHING_TO_SEND,
            Self::Storage(_) => ErrorFlags::OPENING_FILE,
            Self::NoAckLimit => ErrorFlags::NO_ACK_LIMIT,
            Self::OpenFailed => ErrorFlags::START_TRANSFER,
            Self::RemoteOpenFailed => ErrorFlags::REMOTE_OPEN.union(ErrorFlags::START_TRANSFER),
            Self::SegmentFailed { .. } => ErrorFlags::SEND_SEGMENT.union(ErrorFlags::SEND_SEGMENTS),
            Self::RestartRequested => ErrorFlags::START_NACK.union(ErrorFlags::SEND_SEGMENTS),
            Self::BadResumePoint { .. } | Self::ResyncLimit => ErrorFlags::SEND_SEGMENTS,
            Self::CloseFailed => ErrorFlags::END_TRANSFER,
            Self::LengthMismatch { .. } => ErrorFlags::LENGTH_MISMATCH,
            Self::CrcMismatch { .. } => ErrorFlags::CRC_MISMATCH,
            Self::InfoFailed => ErrorFlags::SEND_PACKET,
        }
    }

    /// Whether a fresh attempt could succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidConfig | Self::NothingToSend | Self::InvalidName | Self::TooLarge
        )
    }
}

impl From<StorageError> for TransferError {
    fn from(error: StorageError) -> Self {
        TransferError::Storage(error)
    }
}

impl From<LinkError> for TransferError {
    fn from(error: LinkError) -> Self {
        TransferError::Link(error)
    }
}

impl From<DescriptorError> for TransferError {
    fn from(error: DescriptorError) -> Self {
        match error {
            DescriptorError::InvalidName => TransferError::InvalidName,
            DescriptorError::ZeroSegmentSize => TransferError::InvalidConfig,
            DescriptorError::TooManySegments => TransferError::TooLarge,
        }
    }
}
