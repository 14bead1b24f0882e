//! Control header carried at the front of every transfer packet
//!
//! # Layout
//!
//! ```text
//! [packet_type: u8][flags: u8][header_length: u8][data_length: u8][fields...]
//! ```
//!
//! The type-specific fields start at byte 4:
//!
//! | Layout   | Length | Fields                                                          |
//! |----------|--------|-----------------------------------------------------------------|
//! | Transfer | 12     | `total_length: u32 LE`, `content_crc: u16 LE`, `segment_size: u8`, reserved |
//! | Segment  | 6      | `segment_number: u16 LE`                                        |
//! | Info     | 8      | four reserved bytes                                             |
//!
//! Open, Close and their acknowledgements use the transfer layout. Segment
//! writes, their ACK/NACK and Start-NACK use the segment layout; a
//! Segment-NACK carries the segment the sender must resume from.

use crate::config::radio::MAX_FRAME_BODY;
use crate::config::wire::{
    HEADER_SIZE_MAX, INFO_HEADER_LEN, SEGMENT_HEADER_LEN, START_HEADER_LEN, TRANSFER_HEADER_LEN,
};
use heapless::Vec;

/// Packet type codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Segment of content (0xA0)
    SegmentWrite = 0xA0,
    SegmentWriteAck = 0xA1,
    /// Out-of-sequence segment, carries the resume point (0xA2)
    SegmentWriteNack = 0xA2,
    /// Open a transfer, payload is the destination name (0xA4)
    Open = 0xA4,
    OpenAck = 0xA5,
    /// Receiver could not open its destination (0xA6)
    OpenNack = 0xA6,
    /// Close a transfer, payload is the destination name (0xA8)
    Close = 0xA8,
    /// Carries the receiver's written length and CRC (0xA9)
    CloseAck = 0xA9,
    /// Segment received with no transfer open (0xB2)
    StartNack = 0xB2,
    /// Flags-only status packet (0xB8)
    Info = 0xB8,
    InfoAck = 0xB9,
}

impl PacketType {
    /// Try to convert a byte to a PacketType
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xA0 => Some(Self::SegmentWrite),
            0xA1 => Some(Self::SegmentWriteAck),
            0xA2 => Some(Self::SegmentWriteNack),
            0xA4 => Some(Self::Open),
            0xA5 => Some(Self::OpenAck),
            0xA6 => Some(Self::OpenNack),
            0xA8 => Some(Self::Close),
            0xA9 => Some(Self::CloseAck),
            0xB2 => Some(Self::StartNack),
            0xB8 => Some(Self::Info),
            0xB9 => Some(Self::InfoAck),
            _ => None,
        }
    }

    fn layout(self) -> Layout {
        match self {
            Self::Open | Self::OpenAck | Self::OpenNack | Self::Close | Self::CloseAck => {
                Layout::Transfer
            }
            Self::SegmentWrite | Self::SegmentWriteAck | Self::SegmentWriteNack => Layout::Segment,
            Self::StartNack => Layout::Start,
            Self::Info | Self::InfoAck => Layout::Info,
        }
    }

    /// Encoded header length for this packet type
    pub fn header_len(self) -> u8 {
        match self.layout() {
            Layout::Transfer => TRANSFER_HEADER_LEN,
            Layout::Segment => SEGMENT_HEADER_LEN,
            Layout::Start => START_HEADER_LEN,
            Layout::Info => INFO_HEADER_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Transfer,
    Segment,
    Start,
    Info,
}

/// Transfer-wide status bits carried in byte 1 of every header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferFlags(u8);

impl TransferFlags {
    /// Remote did not persist the content to storage
    pub const NO_FILE_SAVE: Self = Self(1 << 0);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Encoded header bytes
pub type HeaderBytes = Vec<u8, HEADER_SIZE_MAX>;

/// Decoded control header
///
/// All type-specific fields are decoded in place, whatever the packet type.
/// Only the fields belonging to the packet's layout are meaningful; note
/// that `segment_number` shares bytes 4-5 with `total_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub packet_type: u8,
    pub flags: TransferFlags,
    pub header_length: u8,
    pub data_length: u8,
    pub segment_number: u16,
    pub total_length: u32,
    pub content_crc: u16,
    pub segment_size: u8,
}

impl Header {
    /// Header for Open, Close and their acknowledgements
    pub fn transfer(
        kind: PacketType,
        flags: TransferFlags,
        data_length: u8,
        total_length: u32,
        content_crc: u16,
        segment_size: u8,
    ) -> Self {
        Self {
            packet_type: kind as u8,
            flags,
            header_length: kind.header_len(),
            data_length,
            segment_number: total_length as u16,
            total_length,
            content_crc,
            segment_size,
        }
    }

    /// Header for segment writes, their ACK/NACK and Start-NACK
    pub fn segment(
        kind: PacketType,
        flags: TransferFlags,
        data_length: u8,
        segment_number: u16,
    ) -> Self {
        Self {
            packet_type: kind as u8,
            flags,
            header_length: kind.header_len(),
            data_length,
            segment_number,
            total_length: segment_number as u32,
            content_crc: 0,
            segment_size: 0,
        }
    }

    /// Header for Info and Info-ACK
    pub fn info(kind: PacketType, flags: TransferFlags) -> Self {
        Self {
            packet_type: kind as u8,
            flags,
            header_length: kind.header_len(),
            ..Self::default()
        }
    }

    /// Packet type, if it is one this protocol knows
    pub fn kind(&self) -> Option<PacketType> {
        PacketType::from_byte(self.packet_type)
    }

    /// Whether header and payload fit in one radio frame
    pub fn fits_frame(&self) -> bool {
        self.header_length as usize + self.data_length as usize <= MAX_FRAME_BODY
    }

    /// Decode a header in place
    ///
    /// Never fails: bytes past the end of `bytes` read as zero.
    pub fn decode(bytes: &[u8]) -> Self {
        let byte = |index: usize| bytes.get(index).copied().unwrap_or(0);
        let total_length = u32::from_le_bytes([byte(4), byte(5), byte(6), byte(7)]);

        Self {
            packet_type: byte(0),
            flags: TransferFlags::from_bits(byte(1)),
            header_length: byte(2),
            data_length: byte(3),
            segment_number: total_length as u16,
            total_length,
            content_crc: u16::from_le_bytes([byte(8), byte(9)]),
            segment_size: byte(10),
        }
    }

    /// Encode to exactly `header_length` bytes
    ///
    /// Bytes not covered by the packet's layout are written as zero.
    pub fn encode(&self) -> HeaderBytes {
        let mut out: [u8; HEADER_SIZE_MAX] = [0; HEADER_SIZE_MAX];
        out[0] = self.packet_type;
        out[1] = self.flags.bits();
        out[2] = self.header_length;
        out[3] = self.data_length;

        match self.kind().map(PacketType::layout) {
            Some(Layout::Transfer) => {
                out[4..8].copy_from_slice(&self.total_length.to_le_bytes());
                out[8..10].copy_from_slice(&self.content_crc.to_le_bytes());
                out[10] = self.segment_size;
            }
            Some(Layout::Segment) | Some(Layout::Start) => {
                out[4..6].copy_from_slice(&self.segment_number.to_le_bytes());
            }
            Some(Layout::Info) | None => {}
        }

        let len = (self.header_length as usize).min(HEADER_SIZE_MAX);
        let mut bytes = Vec::new();
        let _ = bytes.extend_from_slice(&out[..len]);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_header_layout() {
        let header = Header::transfer(
            PacketType::Open,
            TransferFlags::empty(),
            9,
            0x0001_E240,
            0xBEEF,
            245,
        );
        let bytes = header.encode();

        assert_eq!(
            bytes.as_slice(),
            &[0xA4, 0x00, 12, 9, 0x40, 0xE2, 0x01, 0x00, 0xEF, 0xBE, 245, 0]
        );
    }

    #[test]
    fn test_segment_header_layout() {
        let header = Header::segment(PacketType::SegmentWrite, TransferFlags::empty(), 200, 0x0102);
        let bytes = header.encode();

        assert_eq!(bytes.as_slice(), &[0xA0, 0x00, 6, 200, 0x02, 0x01]);
    }

    #[test]
    fn test_info_header_is_padded() {
        let header = Header::info(PacketType::Info, TransferFlags::NO_FILE_SAVE);
        let bytes = header.encode();

        assert_eq!(bytes.as_slice(), &[0xB8, 0x01, 8, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_close_ack() {
        let bytes = [0xA9, 0x01, 12, 0, 0xE8, 0x03, 0x00, 0x00, 0x34, 0x12, 245, 0];
        let header = Header::decode(&bytes);

        assert_eq!(header.kind(), Some(PacketType::CloseAck));
        assert!(header.flags.contains(TransferFlags::NO_FILE_SAVE));
        assert_eq!(header.total_length, 1000);
        assert_eq!(header.content_crc, 0x1234);
        assert_eq!(header.segment_size, 245);
    }

    #[test]
    fn test_decode_nack_resume_point() {
        let header = Header::decode(&[0xA2, 0x00, 6, 0, 0x02, 0x00]);

        assert_eq!(header.kind(), Some(PacketType::SegmentWriteNack));
        assert_eq!(header.segment_number, 2);
    }

    #[test]
    fn test_decode_short_buffer_is_total() {
        let header = Header::decode(&[0xA1]);

        assert_eq!(header.kind(), Some(PacketType::SegmentWriteAck));
        assert_eq!(header.header_length, 0);
        assert_eq!(header.segment_number, 0);

        let empty = Header::decode(&[]);
        assert_eq!(empty, Header::default());
    }

    #[test]
    fn test_unknown_type() {
        let header = Header::decode(&[0x55, 0x00, 4, 0]);
        assert_eq!(header.kind(), None);
        assert_eq!(header.encode().as_slice(), &[0x55, 0x00, 4, 0]);
    }

    #[test]
    fn test_frame_fit() {
        let max = Header::segment(PacketType::SegmentWrite, TransferFlags::empty(), 245, 0);
        assert!(max.fits_frame());

        let mut too_big =
            Header::transfer(PacketType::Open, TransferFlags::empty(), 245, 1, 0, 245);
        assert!(!too_big.fits_frame());
        too_big.data_length = 239;
        assert!(too_big.fits_frame());
    }

    #[test]
    fn test_flags() {
        let mut flags = TransferFlags::empty();
        assert!(flags.is_empty());
        flags.insert(TransferFlags::NO_FILE_SAVE);
        assert_eq!(flags.bits(), 0x01);
        flags.remove(TransferFlags::NO_FILE_SAVE);
        assert!(flags.is_empty());
    }
}
