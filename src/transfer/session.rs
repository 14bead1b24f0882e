//! Transfer session: one node's end of the protocol
//!
//! A session owns the transport, the clock, the configuration and the
//! counters. `send_file` drives the [`Sender`] through up to
//! `start_attempts` whole attempts; the receive side feeds packets from the
//! transport into a [`Receiver`].

use crate::clock::Clock;
use crate::config::wire::{DATA_SIZE_MAX, HEADER_SIZE_MAX};
use crate::config::TransferConfig;
use crate::protocol::header::{Header, TransferFlags};
use crate::storage::traits::{SegmentSink, SegmentSource};
use crate::transfer::counters::SessionCounters;
use crate::transfer::descriptor::TransferName;
use crate::transfer::error::{ErrorFlags, TransferError};
use crate::transfer::receiver::{ReceiveEvent, ReceivedTransfer, Receiver};
use crate::transfer::sender::Sender;
use crate::transfer::traits::{LinkError, Transport};
use log::{info, warn};

/// Summary of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub name: TransferName,
    pub total_length: u32,
    pub content_crc: u16,
    pub segment_count: u16,
    /// Attempt that succeeded, starting at 1
    pub attempts: u8,
    pub acks: u32,
    pub no_acks: u32,
    pub resyncs: u32,
    pub elapsed_ms: u64,
    pub remote_flags: TransferFlags,
}

impl TransferReport {
    /// Effective content rate in bits per second
    pub fn bits_per_second(&self) -> u32 {
        if self.elapsed_ms == 0 {
            return 0;
        }
        (self.total_length as u64 * 8 * 1000 / self.elapsed_ms) as u32
    }
}

/// One end of a transfer over a transport
pub struct TransferSession<L: Transport, C: Clock> {
    link: L,
    clock: C,
    config: TransferConfig,
    counters: SessionCounters,
    /// Flags sent by this node in every header
    flags: TransferFlags,
    /// Start of the transfer being received
    rx_started_ms: Option<u64>,
}

impl<L: Transport, C: Clock> TransferSession<L, C> {
    pub fn new(link: L, clock: C, config: TransferConfig) -> Self {
        Self {
            link,
            clock,
            config,
            counters: SessionCounters::default(),
            flags: TransferFlags::empty(),
            rx_started_ms: None,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    /// Accumulated error mask of the last operation
    pub fn errors(&self) -> ErrorFlags {
        self.counters.errors
    }

    pub fn set_flags(&mut self, flags: TransferFlags) {
        self.flags = flags;
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Release the transport
    pub fn into_inner(self) -> L {
        self.link
    }

    /// Send `name` from `source` to the remote end
    ///
    /// Counters and the error mask are cleared first. Failed attempts are
    /// retried from Opening up to `start_attempts` times; the error of the
    /// last attempt is returned.
    pub async fn send_file<S: SegmentSource>(
        &mut self,
        source: &mut S,
        name: &str,
    ) -> Result<TransferReport, TransferError> {
        self.counters.reset();
        if !self.config.is_valid() {
            return Err(TransferError::InvalidConfig);
        }

        let started = self.clock.now_ms();
        let mut sender = Sender::new(self.config.clone(), self.flags);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.counters.begin_attempt(attempt);
            info!("Transfer: Sending '{}', attempt {}", name, attempt);

            let result = sender
                .run_attempt(&mut self.link, source, name, &mut self.counters)
                .await;
            self.counters.elapsed_ms = self.clock.now_ms().saturating_sub(started);

            let error = match result {
                Ok(()) => return Ok(self.report(&sender, attempt)),
                Err(error) => error,
            };
            self.counters.errors.insert(error.flags());
            warn!("Transfer: Attempt {} failed ({:?})", attempt, error);

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt >= self.config.start_attempts {
                self.counters.errors.insert(ErrorFlags::SEND_FILE);
                return Err(error);
            }
        }
    }

    fn report(&self, sender: &Sender, attempt: u8) -> TransferReport {
        let (name, total_length, content_crc, segment_count) = match sender.descriptor() {
            Some(d) => (d.name.clone(), d.total_length, d.content_crc, d.segment_count),
            None => (TransferName::new(), 0, 0, 0),
        };
        let report = TransferReport {
            name,
            total_length,
            content_crc,
            segment_count,
            attempts: attempt,
            acks: self.counters.acks,
            no_acks: self.counters.no_acks,
            resyncs: self.counters.resyncs,
            elapsed_ms: self.counters.elapsed_ms,
            remote_flags: sender.remote_flags(),
        };
        info!(
            "Transfer: Sent '{}', {} bytes in {} ms ({} bps), {} no-acks",
            report.name.as_str(),
            report.total_length,
            report.elapsed_ms,
            report.bits_per_second(),
            report.no_acks
        );
        report
    }

    /// Exchange an Info packet carrying this node's flags
    pub async fn send_info(&mut self) -> Result<(), TransferError> {
        self.counters.begin_attempt(1);
        let mut sender = Sender::new(self.config.clone(), self.flags);
        let result = sender.send_info(&mut self.link, &mut self.counters).await;
        if let Err(error) = result {
            self.counters.errors.insert(error.flags());
        }
        result
    }

    /// Hand one received packet to `receiver`
    pub async fn process_packet<K: SegmentSink>(
        &mut self,
        receiver: &mut Receiver<K>,
        header: &[u8],
        payload: &[u8],
    ) -> ReceiveEvent {
        let header = Header::decode(header);
        if !header.fits_frame() {
            warn!(
                "Receiver: Header claims {} + {} bytes, more than one frame",
                header.header_length, header.data_length
            );
            self.counters.rx_errors += 1;
            return ReceiveEvent::Ignored(header.packet_type);
        }
        let data_len = (header.data_length as usize).min(payload.len());

        let event = receiver
            .handle_packet(&mut self.link, &header, &payload[..data_len], &mut self.counters)
            .await;

        match &event {
            ReceiveEvent::Opened => {
                self.counters.segments_received = 0;
                self.rx_started_ms = Some(self.clock.now_ms());
            }
            ReceiveEvent::Closed(_) => {
                if let Some(started) = self.rx_started_ms.take() {
                    self.counters.elapsed_ms = self.clock.now_ms().saturating_sub(started);
                }
            }
            ReceiveEvent::Ignored(_) => self.counters.rx_errors += 1,
            _ => {}
        }
        event
    }

    /// Receive one packet and hand it to `receiver`
    pub async fn receive_packet<K: SegmentSink>(
        &mut self,
        receiver: &mut Receiver<K>,
        timeout_ms: u32,
    ) -> Result<ReceiveEvent, LinkError> {
        let mut header = [0u8; HEADER_SIZE_MAX];
        let mut payload = [0u8; DATA_SIZE_MAX];

        let received = self.link.receive(&mut header, &mut payload, timeout_ms).await?;
        Ok(self
            .process_packet(
                receiver,
                &header[..received.header_len],
                &payload[..received.data_len],
            )
            .await)
    }

    /// Serve packets until a transfer closes
    ///
    /// Gives up when nothing arrives for `rx_timeout_ms` or once more than
    /// `rx_error_limit` consecutive bad frames arrive.
    pub async fn receive_loop<K: SegmentSink>(
        &mut self,
        receiver: &mut Receiver<K>,
    ) -> Result<ReceivedTransfer, TransferError> {
        self.counters.reset();
        let mut consecutive_errors: u32 = 0;

        loop {
            match self.receive_packet(receiver, self.config.rx_timeout_ms).await {
                Ok(ReceiveEvent::Closed(transfer)) => return Ok(transfer),
                Ok(_) => consecutive_errors = 0,
                Err(LinkError::Timeout) => {
                    warn!("Receiver: Nothing received for {} ms", self.config.rx_timeout_ms);
                    return Err(TransferError::ReceiveTimeout);
                }
                Err(error) => {
                    self.counters.rx_errors += 1;
                    consecutive_errors += 1;
                    warn!("Receiver: Bad packet ({:?})", error);
                    if consecutive_errors > u32::from(self.config.rx_error_limit) {
                        return Err(TransferError::Link(error));
                    }
                }
            }
        }
    }
}
