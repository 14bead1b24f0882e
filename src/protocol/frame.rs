//! Reliable frame envelope around header and payload
//!
//! Every radio packet carries a 4 byte trailer:
//!
//! ```text
//! [header][payload][network_id: u16 LE][payload_crc: u16 LE]
//! ```
//!
//! An acknowledgement is a bare header followed by the trailer of the packet
//! it answers, so the sender can tell a reply to its own last frame from
//! stray traffic.

use crate::config::radio::{FRAME_TRAILER_SIZE, MAX_FRAME_BODY, MAX_PACKET_SIZE, MIN_FRAME_SIZE};
use crate::protocol::checksum::crc16;
use heapless::Vec;

/// Encoded radio frame
pub type FrameBytes = Vec<u8, MAX_PACKET_SIZE>;

/// Errors found while building or checking a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Header and payload do not fit in one packet
    TooLarge,
    /// Fewer bytes than the smallest valid frame
    TooShort,
    /// Declared header/data lengths disagree with the frame length
    LengthMismatch,
    /// Frame belongs to another network
    NetworkId,
    /// Payload CRC does not match the trailer
    PayloadCrc,
    /// Acknowledgement does not echo the last transmitted frame
    AckMismatch,
}

/// Trailer appended to every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trailer {
    pub network_id: u16,
    pub payload_crc: u16,
}

impl Trailer {
    /// Trailer for `payload`, with the CRC left at zero when disabled
    pub fn for_payload(network_id: u16, payload: &[u8], payload_crc: bool) -> Self {
        Self {
            network_id,
            payload_crc: if payload_crc { crc16(payload) } else { 0 },
        }
    }

    fn read(frame: &[u8]) -> Self {
        let t = &frame[frame.len() - FRAME_TRAILER_SIZE..];
        Self {
            network_id: u16::from_le_bytes([t[0], t[1]]),
            payload_crc: u16::from_le_bytes([t[2], t[3]]),
        }
    }
}

/// Header and payload split out of a checked frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    pub header: &'a [u8],
    pub payload: &'a [u8],
    pub trailer: Trailer,
}

/// Build a frame from header, payload and trailer
pub fn encode_frame(
    header: &[u8],
    payload: &[u8],
    trailer: Trailer,
) -> Result<FrameBytes, FrameError> {
    if header.len() + payload.len() > MAX_FRAME_BODY {
        return Err(FrameError::TooLarge);
    }

    let mut frame = FrameBytes::new();
    let _ = frame.extend_from_slice(header);
    let _ = frame.extend_from_slice(payload);
    let _ = frame.extend_from_slice(&trailer.network_id.to_le_bytes());
    let _ = frame.extend_from_slice(&trailer.payload_crc.to_le_bytes());
    Ok(frame)
}

/// Split and check a received data frame
///
/// The header's own length bytes (2 and 3) locate the payload.
pub fn decode_frame(
    frame: &[u8],
    network_id: u16,
    payload_crc: bool,
) -> Result<FrameView<'_>, FrameError> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(FrameError::TooShort);
    }

    let header_len = frame[2] as usize;
    let data_len = frame[3] as usize;
    if header_len < 4 || header_len + data_len + FRAME_TRAILER_SIZE != frame.len() {
        return Err(FrameError::LengthMismatch);
    }

    let trailer = Trailer::read(frame);
    if trailer.network_id != network_id {
        return Err(FrameError::NetworkId);
    }

    let payload = &frame[header_len..header_len + data_len];
    if payload_crc && crc16(payload) != trailer.payload_crc {
        return Err(FrameError::PayloadCrc);
    }

    Ok(FrameView {
        header: &frame[..header_len],
        payload,
        trailer,
    })
}

/// Check an acknowledgement against the trailer of the frame it answers
///
/// Returns the acknowledgement header.
pub fn decode_ack(frame: &[u8], sent: Trailer, payload_crc: bool) -> Result<&[u8], FrameError> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(FrameError::TooShort);
    }

    let trailer = Trailer::read(frame);
    if trailer.network_id != sent.network_id {
        return Err(FrameError::NetworkId);
    }
    if payload_crc && trailer.payload_crc != sent.payload_crc {
        return Err(FrameError::AckMismatch);
    }

    Ok(&frame[..frame.len() - FRAME_TRAILER_SIZE])
}
