//! Sending side of a transfer
//!
//! One attempt runs Opening, Transferring and Closing in order. Each packet
//! is sent and then waited on; at most one segment is ever in flight.
//!
//! A missed or unusable reply counts as a no-ack and the same packet is sent
//! again, up to `send_attempts` times. Too many no-acks in one attempt fail
//! the attempt, as do Start-NACK, Open-NACK and an integrity mismatch at
//! Close. Retrying whole attempts is left to the session.

use crate::config::wire::{DATA_SIZE_MAX, HEADER_SIZE_MAX};
use crate::config::TransferConfig;
use crate::protocol::header::{Header, PacketType, TransferFlags};
use crate::storage::traits::SegmentSource;
use crate::transfer::counters::SessionCounters;
use crate::transfer::descriptor::TransferDescriptor;
use crate::transfer::error::{ErrorFlags, TransferError};
use crate::transfer::traits::Transport;
use log::{debug, info, warn};

/// Sender progress through one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Opening,
    Transferring,
    Closing,
    Complete,
    Failed,
}

/// Outcome of one segment exchange
enum SegmentReply {
    Acked,
    /// Receiver wants the transfer resumed from this segment
    Resume(u16),
}

/// Sender state machine
pub struct Sender {
    config: TransferConfig,
    state: SenderState,
    /// Flags sent in every header
    flags: TransferFlags,
    /// Flags seen in the receiver's replies
    remote_flags: TransferFlags,
    descriptor: Option<TransferDescriptor>,
    next_segment: u16,
}

impl Sender {
    pub fn new(config: TransferConfig, flags: TransferFlags) -> Self {
        Self {
            config,
            state: SenderState::Idle,
            flags,
            remote_flags: TransferFlags::empty(),
            descriptor: None,
            next_segment: 0,
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn descriptor(&self) -> Option<&TransferDescriptor> {
        self.descriptor.as_ref()
    }

    /// Next segment to be sent or resent
    pub fn next_segment(&self) -> u16 {
        self.next_segment
    }

    pub fn remote_flags(&self) -> TransferFlags {
        self.remote_flags
    }

    /// Run one complete attempt at sending `name` from `source`
    pub async fn run_attempt<L: Transport, S: SegmentSource>(
        &mut self,
        link: &mut L,
        source: &mut S,
        name: &str,
        counters: &mut SessionCounters,
    ) -> Result<(), TransferError> {
        self.descriptor = None;
        self.next_segment = 0;
        self.remote_flags = TransferFlags::empty();

        if !self.config.is_valid() {
            self.state = SenderState::Failed;
            return Err(TransferError::InvalidConfig);
        }

        let result = self.run_phases(link, source, name, counters).await;
        source.close();

        self.state = match result {
            Ok(()) => SenderState::Complete,
            Err(_) => SenderState::Failed,
        };
        result
    }

    async fn run_phases<L: Transport, S: SegmentSource>(
        &mut self,
        link: &mut L,
        source: &mut S,
        name: &str,
        counters: &mut SessionCounters,
    ) -> Result<(), TransferError> {
        self.open(link, source, name, counters).await?;
        self.transfer(link, source, counters).await?;
        self.close(link, counters).await
    }

    /// Exchange an Info packet carrying only our flags
    pub async fn send_info<L: Transport>(
        &mut self,
        link: &mut L,
        counters: &mut SessionCounters,
    ) -> Result<(), TransferError> {
        if !self.config.is_valid() {
            return Err(TransferError::InvalidConfig);
        }
        let header = Header::info(PacketType::Info, self.flags);

        for attempt in 1..=self.config.send_attempts {
            debug!("Transfer: Info, attempt {}", attempt);
            match exchange(link, &header, &[], self.config.ack_seg_timeout_ms).await {
                Some(reply) if reply.kind() == Some(PacketType::InfoAck) => {
                    self.observe(&reply, counters);
                    return Ok(());
                }
                Some(reply) => {
                    warn!("Transfer: Info answered with {:#04x}", reply.packet_type);
                    return Err(TransferError::InfoFailed);
                }
                None => self.note_no_ack(counters)?,
            }
        }
        Err(TransferError::InfoFailed)
    }

    async fn open<L: Transport, S: SegmentSource>(
        &mut self,
        link: &mut L,
        source: &mut S,
        name: &str,
        counters: &mut SessionCounters,
    ) -> Result<(), TransferError> {
        self.state = SenderState::Opening;

        let total_length = source.open_for_read(name)?;
        if total_length == 0 {
            return Err(TransferError::NothingToSend);
        }
        let content_crc = if self.config.content_crc {
            source.compute_crc(total_length)?
        } else {
            0
        };
        let descriptor =
            TransferDescriptor::new(name, total_length, content_crc, self.config.segment_size)?;

        let header = Header::transfer(
            PacketType::Open,
            self.flags,
            name.len() as u8,
            total_length,
            content_crc,
            descriptor.segment_size,
        );
        info!(
            "Transfer: Open '{}', {} bytes in {} segments, CRC {:#06x}",
            name, total_length, descriptor.segment_count, content_crc
        );
        self.descriptor = Some(descriptor);

        for attempt in 1..=self.config.send_attempts {
            debug!("Transfer: Open, attempt {}", attempt);
            let reply =
                exchange(link, &header, name.as_bytes(), self.config.ack_open_timeout_ms).await;
            match reply {
                Some(reply) if reply.kind() == Some(PacketType::OpenAck) => {
                    self.observe(&reply, counters);
                    return Ok(());
                }
                Some(reply) if reply.kind() == Some(PacketType::OpenNack) => {
                    warn!("Transfer: Receiver could not open '{}'", name);
                    return Err(TransferError::RemoteOpenFailed);
                }
                _ => self.note_no_ack(counters)?,
            }
        }
        Err(TransferError::OpenFailed)
    }

    async fn transfer<L: Transport, S: SegmentSource>(
        &mut self,
        link: &mut L,
        source: &mut S,
        counters: &mut SessionCounters,
    ) -> Result<(), TransferError> {
        self.state = SenderState::Transferring;
        let descriptor = self.descriptor.clone().ok_or(TransferError::InvalidConfig)?;

        source.seek(0)?;
        self.next_segment = 0;

        let mut data = [0u8; DATA_SIZE_MAX];
        while self.next_segment < descriptor.segment_count {
            let segment = self.next_segment;
            let chunk = &mut data[..descriptor.segment_len(segment)];
            source.read_segment(chunk)?;

            match self.send_segment(link, segment, chunk, counters).await? {
                SegmentReply::Acked => {
                    self.next_segment += 1;
                    counters.segments_sent += 1;
                }
                SegmentReply::Resume(resume) => {
                    if resume > descriptor.segment_count {
                        warn!("Transfer: Resume point {} past last segment", resume);
                        return Err(TransferError::BadResumePoint { segment: resume });
                    }
                    counters.resyncs += 1;
                    if counters.resyncs > self.config.no_ack_limit as u32 {
                        return Err(TransferError::ResyncLimit);
                    }
                    info!("Transfer: NACK for segment {}, resuming at {}", segment, resume);
                    source.seek(descriptor.segment_offset(resume))?;
                    self.next_segment = resume;
                }
            }
        }
        Ok(())
    }

    async fn send_segment<L: Transport>(
        &mut self,
        link: &mut L,
        segment: u16,
        data: &[u8],
        counters: &mut SessionCounters,
    ) -> Result<SegmentReply, TransferError> {
        let header =
            Header::segment(PacketType::SegmentWrite, self.flags, data.len() as u8, segment);

        for _ in 0..self.config.send_attempts {
            let reply = exchange(link, &header, data, self.config.ack_seg_timeout_ms).await;
            let Some(reply) = reply else {
                debug!("Transfer: No ACK for segment {}", segment);
                self.note_no_ack(counters)?;
                continue;
            };

            match reply.kind() {
                Some(PacketType::SegmentWriteAck) if reply.segment_number == segment => {
                    counters.acks += 1;
                    self.observe(&reply, counters);
                    return Ok(SegmentReply::Acked);
                }
                Some(PacketType::SegmentWriteNack) => {
                    self.observe(&reply, counters);
                    return Ok(SegmentReply::Resume(reply.segment_number));
                }
                Some(PacketType::StartNack) => {
                    warn!("Transfer: Receiver has no transfer open");
                    return Err(TransferError::RestartRequested);
                }
                _ => self.note_no_ack(counters)?,
            }
        }

        warn!("Transfer: Segment {} failed", segment);
        Err(TransferError::SegmentFailed { segment })
    }

    async fn close<L: Transport>(
        &mut self,
        link: &mut L,
        counters: &mut SessionCounters,
    ) -> Result<(), TransferError> {
        self.state = SenderState::Closing;
        let descriptor = self.descriptor.clone().ok_or(TransferError::InvalidConfig)?;

        let header = Header::transfer(
            PacketType::Close,
            self.flags,
            descriptor.name.len() as u8,
            descriptor.total_length,
            descriptor.content_crc,
            descriptor.segment_size,
        );

        for attempt in 1..=self.config.send_attempts {
            debug!("Transfer: Close, attempt {}", attempt);
            let reply = exchange(
                link,
                &header,
                descriptor.name.as_bytes(),
                self.config.ack_close_timeout_ms,
            )
            .await;

            match reply {
                Some(reply) if reply.kind() == Some(PacketType::CloseAck) => {
                    self.observe(&reply, counters);
                    return self.verify(&descriptor, &reply);
                }
                _ => self.note_no_ack(counters)?,
            }
        }
        Err(TransferError::CloseFailed)
    }

    /// Compare what the receiver stored with what was sent
    fn verify(&self, descriptor: &TransferDescriptor, reply: &Header) -> Result<(), TransferError> {
        if reply.total_length != descriptor.total_length {
            warn!(
                "Transfer: Length mismatch, sent {} received {}",
                descriptor.total_length, reply.total_length
            );
            return Err(TransferError::LengthMismatch {
                local: descriptor.total_length,
                remote: reply.total_length,
            });
        }
        if self.config.content_crc && reply.content_crc != descriptor.content_crc {
            warn!(
                "Transfer: CRC mismatch, sent {:#06x} received {:#06x}",
                descriptor.content_crc, reply.content_crc
            );
            return Err(TransferError::CrcMismatch {
                local: descriptor.content_crc,
                remote: reply.content_crc,
            });
        }
        Ok(())
    }

    fn note_no_ack(&self, counters: &mut SessionCounters) -> Result<(), TransferError> {
        counters.no_acks += 1;
        if counters.no_acks > self.config.no_ack_limit as u32 {
            warn!("Transfer: No-ack limit of {} reached", self.config.no_ack_limit);
            return Err(TransferError::NoAckLimit);
        }
        Ok(())
    }

    fn observe(&mut self, reply: &Header, counters: &mut SessionCounters) {
        if reply.flags.contains(TransferFlags::NO_FILE_SAVE) {
            self.remote_flags.insert(TransferFlags::NO_FILE_SAVE);
            counters.errors.insert(ErrorFlags::NO_FILE_SAVE);
        }
    }
}

/// Send one packet and wait for its reply
///
/// Transmit failures and missing or mismatched replies all come back as
/// `None`.
async fn exchange<L: Transport>(
    link: &mut L,
    header: &Header,
    payload: &[u8],
    timeout_ms: u32,
) -> Option<Header> {
    if let Err(error) = link.transmit(&header.encode(), payload).await {
        warn!("Transfer: Transmit failed ({:?})", error);
        return None;
    }

    let mut reply = [0u8; HEADER_SIZE_MAX];
    match link.wait_for_ack(&mut reply, timeout_ms).await {
        Ok(len) => Some(Header::decode(&reply[..len])),
        Err(error) => {
            debug!("Transfer: No reply ({:?})", error);
            None
        }
    }
}
