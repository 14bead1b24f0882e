//! Transport trait consumed by the transfer state machines
//!
//! The sender needs to transmit a request and wait for the matching reply;
//! the receiver needs to receive a request and fire back a reply. Anything
//! that can do this for one peer (a LoRa radio behind
//! [`ReliableLink`](crate::lora::link::ReliableLink), or an in-process
//! loopback in tests) can carry a transfer.

use crate::lora::traits::LoraError;
use crate::protocol::frame::FrameError;
use core::future::Future;

/// Errors that can occur while moving packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Nothing arrived before the timeout
    Timeout,
    /// Radio driver failure
    Radio(LoraError),
    /// Malformed, foreign or unmatched frame
    Frame(FrameError),
    /// Caller's buffer cannot hold the received header or payload
    BufferTooSmall,
}

impl From<LoraError> for LinkError {
    fn from(error: LoraError) -> Self {
        match error {
            LoraError::Timeout => LinkError::Timeout,
            other => LinkError::Radio(other),
        }
    }
}

impl From<FrameError> for LinkError {
    fn from(error: FrameError) -> Self {
        LinkError::Frame(error)
    }
}

/// Lengths and signal quality of a received packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Received {
    pub header_len: usize,
    pub data_len: usize,
    /// Received Signal Strength Indicator in dBm
    pub rssi: i16,
    /// Signal-to-Noise Ratio in dB
    pub snr: i8,
}

/// Packet transport between the two ends of a transfer
pub trait Transport {
    /// Send a header and payload as one packet
    ///
    /// Returns the number of bytes put on air.
    fn transmit(
        &mut self,
        header: &[u8],
        payload: &[u8],
    ) -> impl Future<Output = Result<usize, LinkError>>;

    /// Wait for the reply to the last transmitted packet
    ///
    /// The reply header is copied into `header`; returns its length.
    fn wait_for_ack(
        &mut self,
        header: &mut [u8],
        timeout_ms: u32,
    ) -> impl Future<Output = Result<usize, LinkError>>;

    /// Receive one request packet into the given buffers
    fn receive(
        &mut self,
        header: &mut [u8],
        payload: &mut [u8],
        timeout_ms: u32,
    ) -> impl Future<Output = Result<Received, LinkError>>;

    /// Reply to the last received packet, no acknowledgement expected
    fn send_ack(&mut self, header: &[u8]) -> impl Future<Output = Result<(), LinkError>>;
}
