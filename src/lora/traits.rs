//! Raw packet interface of the LoRa radio
//!
//! The transfer protocol never touches modem registers. A board crate
//! implements [`LoraRadio`] for its chip (modulation, frequency and power
//! are set up there) and the protocol only moves whole packets through it.

use crate::config::radio::MAX_PACKET_SIZE;
use core::future::Future;
use heapless::Vec;

/// Radio failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoraError {
    /// Nothing received before the timeout
    Timeout,
    /// Packet failed the modem's own CRC
    CrcError,
    TransmitFailed,
    ReceiveFailed,
    /// Chip stayed busy or did not answer on its bus
    Hardware,
}

/// Packet as received off air
#[derive(Debug, Clone)]
pub struct RxPacket {
    pub data: Vec<u8, MAX_PACKET_SIZE>,
    /// Received Signal Strength Indicator in dBm
    pub rssi: i16,
    /// Signal-to-Noise Ratio in dB
    pub snr: i8,
}

/// Half-duplex LoRa radio
pub trait LoraRadio {
    /// Send one packet, completing once it is off air
    fn transmit(&mut self, data: &[u8]) -> impl Future<Output = Result<(), LoraError>>;

    /// Listen for one packet for at most `timeout_ms`
    fn receive(&mut self, timeout_ms: u32) -> impl Future<Output = Result<RxPacket, LoraError>>;
}

#[cfg(test)]
pub mod mock {
    //! Scripted radio for link and session tests

    use super::*;
    use core::cell::RefCell;
    use std::collections::VecDeque;

    /// Radio that replays queued packets and records what it sends
    ///
    /// Receiving from an empty queue times out immediately.
    #[derive(Default)]
    pub struct MockLoraRadio {
        rx: RefCell<VecDeque<Result<RxPacket, LoraError>>>,
        tx: RefCell<std::vec::Vec<std::vec::Vec<u8>>>,
        tx_error: RefCell<Option<LoraError>>,
    }

    impl MockLoraRadio {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a packet for a later receive
        pub fn queue_rx(&self, data: &[u8]) {
            let packet = Vec::from_slice(data)
                .map(|data| RxPacket { data, rssi: -87, snr: 6 })
                .map_err(|_| LoraError::ReceiveFailed);
            self.rx.borrow_mut().push_back(packet);
        }

        /// Queue a receive failure in packet order
        pub fn queue_rx_error(&self, error: LoraError) {
            self.rx.borrow_mut().push_back(Err(error));
        }

        /// Make the next transmit fail
        pub fn fail_next_tx(&self, error: LoraError) {
            *self.tx_error.borrow_mut() = Some(error);
        }

        /// Every packet transmitted so far
        pub fn transmitted(&self) -> std::vec::Vec<std::vec::Vec<u8>> {
            self.tx.borrow().clone()
        }
    }

    impl LoraRadio for MockLoraRadio {
        async fn transmit(&mut self, data: &[u8]) -> Result<(), LoraError> {
            if let Some(error) = self.tx_error.borrow_mut().take() {
                return Err(error);
            }
            if data.len() > MAX_PACKET_SIZE {
                return Err(LoraError::TransmitFailed);
            }
            self.tx.borrow_mut().push(data.to_vec());
            Ok(())
        }

        async fn receive(&mut self, _timeout_ms: u32) -> Result<RxPacket, LoraError> {
            self.rx.borrow_mut().pop_front().unwrap_or(Err(LoraError::Timeout))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use futures::executor::block_on;

        #[test]
        fn test_records_transmissions() {
            let mut radio = MockLoraRadio::new();

            block_on(async {
                radio.transmit(&[0xA0, 0x01]).await.unwrap();
                radio.transmit(&[0xA8]).await.unwrap();
            });

            assert_eq!(radio.transmitted(), [vec![0xA0, 0x01], vec![0xA8]]);
        }

        #[test]
        fn test_replays_in_order_then_times_out() {
            let mut radio = MockLoraRadio::new();
            radio.queue_rx(&[1]);
            radio.queue_rx_error(LoraError::CrcError);
            radio.queue_rx(&[2]);

            block_on(async {
                assert_eq!(radio.receive(10).await.unwrap().data.as_slice(), &[1]);
                assert!(matches!(radio.receive(10).await, Err(LoraError::CrcError)));
                assert_eq!(radio.receive(10).await.unwrap().data.as_slice(), &[2]);
                assert!(matches!(radio.receive(10).await, Err(LoraError::Timeout)));
            });
        }

        #[test]
        fn test_transmit_failure_is_one_shot() {
            let mut radio = MockLoraRadio::new();
            radio.fail_next_tx(LoraError::Hardware);

            block_on(async {
                assert_eq!(radio.transmit(&[1]).await, Err(LoraError::Hardware));
                assert_eq!(radio.transmit(&[1]).await, Ok(()));
            });
            assert_eq!(radio.transmitted().len(), 1);
        }

        #[test]
        fn test_oversized_packet_rejected() {
            let mut radio = MockLoraRadio::new();
            let packet = [0u8; MAX_PACKET_SIZE + 1];

            let result = block_on(radio.transmit(&packet));
            assert_eq!(result, Err(LoraError::TransmitFailed));
        }
    }
}
