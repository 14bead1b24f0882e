//! Reliable link over a raw LoRa radio
//!
//! Wraps a [`LoraRadio`] and implements [`Transport`] by adding the frame
//! trailer (network ID and payload CRC) on the way out and checking it on
//! the way in. Replies echo the trailer of the request they answer.

use crate::config::LinkConfig;
use crate::lora::traits::LoraRadio;
use crate::protocol::frame::{decode_ack, decode_frame, encode_frame, Trailer};
use crate::transfer::traits::{LinkError, Received, Transport};
use log::{debug, trace};

/// Transfer transport over a LoRa radio
pub struct ReliableLink<R: LoraRadio> {
    radio: R,
    config: LinkConfig,
    /// Trailer of the last transmitted frame, expected back in its ACK
    last_sent: Trailer,
    /// Trailer of the last received frame, echoed in our ACK
    last_received: Trailer,
}

impl<R: LoraRadio> ReliableLink<R> {
    /// Create a new link over `radio`
    pub fn new(radio: R, config: LinkConfig) -> Self {
        Self {
            radio,
            config,
            last_sent: Trailer::default(),
            last_received: Trailer::default(),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Release the radio
    pub fn into_inner(self) -> R {
        self.radio
    }
}

impl<R: LoraRadio> Transport for ReliableLink<R> {
    async fn transmit(&mut self, header: &[u8], payload: &[u8]) -> Result<usize, LinkError> {
        let trailer =
            Trailer::for_payload(self.config.network_id, payload, self.config.payload_crc);
        let frame = encode_frame(header, payload, trailer)?;

        self.radio.transmit(&frame).await?;
        self.last_sent = trailer;
        Ok(frame.len())
    }

    async fn wait_for_ack(
        &mut self,
        header: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, LinkError> {
        let packet = self.radio.receive(timeout_ms).await?;
        let ack = decode_ack(&packet.data, self.last_sent, self.config.payload_crc)?;

        if ack.len() > header.len() {
            return Err(LinkError::BufferTooSmall);
        }
        header[..ack.len()].copy_from_slice(ack);

        trace!("ACK {} bytes (RSSI: {}, SNR: {})", ack.len(), packet.rssi, packet.snr);
        Ok(ack.len())
    }

    async fn receive(
        &mut self,
        header: &mut [u8],
        payload: &mut [u8],
        timeout_ms: u32,
    ) -> Result<Received, LinkError> {
        let packet = self.radio.receive(timeout_ms).await?;
        let view = decode_frame(&packet.data, self.config.network_id, self.config.payload_crc)?;

        if view.header.len() > header.len() || view.payload.len() > payload.len() {
            return Err(LinkError::BufferTooSmall);
        }
        header[..view.header.len()].copy_from_slice(view.header);
        payload[..view.payload.len()].copy_from_slice(view.payload);
        self.last_received = view.trailer;

        debug!(
            "RX {} + {} bytes (RSSI: {}, SNR: {})",
            view.header.len(),
            view.payload.len(),
            packet.rssi,
            packet.snr
        );

        Ok(Received {
            header_len: view.header.len(),
            data_len: view.payload.len(),
            rssi: packet.rssi,
            snr: packet.snr,
        })
    }

    async fn send_ack(&mut self, header: &[u8]) -> Result<(), LinkError> {
        let frame = encode_frame(header, &[], self.last_received)?;
        self.radio.transmit(&frame).await?;
        Ok(())
    }
}
