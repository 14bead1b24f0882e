//! Protocol and transfer configuration constants

/// Radio packet limits
pub mod radio {
    /// Largest packet the LoRa modem will send or receive
    pub const MAX_PACKET_SIZE: usize = 255;

    /// Network ID and payload CRC appended to every frame
    pub const FRAME_TRAILER_SIZE: usize = 4;

    /// Header plus payload must fit in front of the trailer
    pub const MAX_FRAME_BODY: usize = MAX_PACKET_SIZE - FRAME_TRAILER_SIZE;

    /// Shortest frame accepted as valid (segment header + trailer)
    pub const MIN_FRAME_SIZE: usize = 8;
}

/// Wire format constants
pub mod wire {
    /// Largest header any packet type uses
    pub const HEADER_SIZE_MAX: usize = 16;

    /// Largest payload carried after a header
    pub const DATA_SIZE_MAX: usize = 245;

    /// Longest transfer name carried in Open/Close payloads
    pub const MAX_NAME_LEN: usize = 32;

    /// Header lengths per packet layout
    pub const TRANSFER_HEADER_LEN: u8 = 12;
    pub const SEGMENT_HEADER_LEN: u8 = 6;
    pub const START_HEADER_LEN: u8 = 6;
    pub const INFO_HEADER_LEN: u8 = 8;
}

/// Default transfer settings
pub mod transfer_defaults {
    /// Bytes per segment, 245 is the maximum for LoRa
    pub const SEGMENT_SIZE: u8 = 245;
    /// Attempts at one packet exchange before the attempt fails
    pub const SEND_ATTEMPTS: u8 = 10;
    /// Whole-transfer attempts before giving up
    pub const START_ATTEMPTS: u8 = 2;
    /// Missed acknowledgements tolerated per attempt
    pub const NO_ACK_COUNT_LIMIT: u16 = 250;
    pub const ACK_OPEN_TIMEOUT_MS: u32 = 250;
    pub const ACK_SEG_TIMEOUT_MS: u32 = 75;
    pub const ACK_CLOSE_TIMEOUT_MS: u32 = 250;
    /// Idle time after which the receive loop gives up
    pub const RX_TIMEOUT_MS: u32 = 60_000;
    /// Consecutive bad frames tolerated by the receive loop
    pub const RX_ERROR_LIMIT: u16 = 250;
    /// Whole-content CRC exchanged at Open and Close
    pub const CONTENT_CRC: bool = true;
}

/// Default reliable link settings
pub mod link_defaults {
    /// Both ends must use the same network ID
    pub const NETWORK_ID: u16 = 0x3210;
    /// Per-frame payload CRC
    pub const PAYLOAD_CRC: bool = true;
}

/// Runtime transfer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub segment_size: u8,
    pub send_attempts: u8,
    pub start_attempts: u8,
    pub no_ack_limit: u16,
    pub ack_open_timeout_ms: u32,
    pub ack_seg_timeout_ms: u32,
    pub ack_close_timeout_ms: u32,
    pub rx_timeout_ms: u32,
    pub rx_error_limit: u16,
    pub content_crc: bool,
}

impl TransferConfig {
    /// Check the settings can drive a transfer at all
    pub fn is_valid(&self) -> bool {
        self.segment_size > 0
            && self.segment_size as usize <= wire::DATA_SIZE_MAX
            && self.send_attempts > 0
            && self.start_attempts > 0
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        use transfer_defaults::*;

        Self {
            segment_size: SEGMENT_SIZE,
            send_attempts: SEND_ATTEMPTS,
            start_attempts: START_ATTEMPTS,
            no_ack_limit: NO_ACK_COUNT_LIMIT,
            ack_open_timeout_ms: ACK_OPEN_TIMEOUT_MS,
            ack_seg_timeout_ms: ACK_SEG_TIMEOUT_MS,
            ack_close_timeout_ms: ACK_CLOSE_TIMEOUT_MS,
            rx_timeout_ms: RX_TIMEOUT_MS,
            rx_error_limit: RX_ERROR_LIMIT,
            content_crc: CONTENT_CRC,
        }
    }
}

/// Runtime reliable link settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    pub network_id: u16,
    pub payload_crc: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            network_id: link_defaults::NETWORK_ID,
            payload_crc: link_defaults::PAYLOAD_CRC,
        }
    }
}
