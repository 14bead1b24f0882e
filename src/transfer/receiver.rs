//! Receiving side of a transfer
//!
//! The receiver is reactive: every request packet is handled on its own
//! and answered with exactly one reply, except unknown packet types, which
//! are dropped. Segments are accepted strictly in order.

use crate::config::TransferConfig;
use crate::protocol::header::{Header, PacketType, TransferFlags};
use crate::storage::traits::SegmentSink;
use crate::transfer::counters::SessionCounters;
use crate::transfer::descriptor::{TransferDescriptor, TransferName};
use crate::transfer::traits::Transport;
use log::{debug, info, warn};

/// A transfer the receiver has closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedTransfer {
    pub name: TransferName,
    /// Bytes written to the sink
    pub total_length: u32,
    /// CRC over the written content, 0 when not computed
    pub content_crc: u16,
    /// Length announced by the sender at Open
    pub expected_length: u32,
    /// CRC announced by the sender at Open
    pub expected_crc: u16,
    pub crc_checked: bool,
    /// Sink failed to store some of the content
    pub write_failed: bool,
}

impl ReceivedTransfer {
    /// Whether the written content matches what the sender announced
    pub fn is_intact(&self) -> bool {
        !self.write_failed
            && self.total_length == self.expected_length
            && (!self.crc_checked || self.content_crc == self.expected_crc)
    }
}

/// What handling one packet did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    /// Transfer opened, Open-ACK sent
    Opened,
    /// Destination could not be opened, Open-NACK sent
    OpenRejected,
    /// Segment written and acknowledged
    SegmentWritten(u16),
    /// Repeat of the last segment, acknowledged again without writing
    Duplicate(u16),
    /// Segment out of order, NACK carries the expected one
    OutOfSequence { received: u16, expected: u16 },
    /// Segment with no transfer open, Start-NACK sent
    NotOpen(u16),
    Closed(ReceivedTransfer),
    /// Close with no transfer open, last result repeated
    DuplicateClose,
    Info(TransferFlags),
    /// Unknown or malformed packet, no reply
    Ignored(u8),
}

/// Receiver state machine over a segment sink
pub struct Receiver<K: SegmentSink> {
    sink: K,
    content_crc: bool,
    /// Present while a transfer is open
    descriptor: Option<TransferDescriptor>,
    next_segment_expected: u16,
    last_segment_processed: Option<u16>,
    /// Flags sent in every reply
    flags: TransferFlags,
    remote_flags: TransferFlags,
    /// Result reported by the last Close, repeated for duplicates
    completed: Option<ReceivedTransfer>,
}

impl<K: SegmentSink> Receiver<K> {
    pub fn new(sink: K, config: &TransferConfig) -> Self {
        Self {
            sink,
            content_crc: config.content_crc,
            descriptor: None,
            next_segment_expected: 0,
            last_segment_processed: None,
            flags: TransferFlags::empty(),
            remote_flags: TransferFlags::empty(),
            completed: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.descriptor.is_some()
    }

    pub fn descriptor(&self) -> Option<&TransferDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn next_segment_expected(&self) -> u16 {
        self.next_segment_expected
    }

    pub fn last_segment_processed(&self) -> Option<u16> {
        self.last_segment_processed
    }

    pub fn remote_flags(&self) -> TransferFlags {
        self.remote_flags
    }

    pub fn completed(&self) -> Option<&ReceivedTransfer> {
        self.completed.as_ref()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Abandon any open transfer without replying
    pub fn reset(&mut self) {
        if self.descriptor.take().is_some() {
            self.sink.close();
        }
        self.next_segment_expected = 0;
        self.last_segment_processed = None;
    }

    /// Handle one request packet and send its reply
    ///
    /// `payload` holds exactly the packet's data bytes. A reply that fails
    /// to send is logged and otherwise ignored; the sender will repeat the
    /// request.
    pub async fn handle_packet<L: Transport>(
        &mut self,
        link: &mut L,
        header: &Header,
        payload: &[u8],
        counters: &mut SessionCounters,
    ) -> ReceiveEvent {
        match header.kind() {
            Some(PacketType::Open) => self.on_open(link, header, payload).await,
            Some(PacketType::SegmentWrite) => {
                self.on_segment(link, header, payload, counters).await
            }
            Some(PacketType::Close) => self.on_close(link, header).await,
            Some(PacketType::Info) => {
                self.remote_flags = header.flags;
                self.reply(link, Header::info(PacketType::InfoAck, self.flags)).await;
                ReceiveEvent::Info(header.flags)
            }
            _ => {
                debug!("Receiver: Ignoring packet type {:#04x}", header.packet_type);
                ReceiveEvent::Ignored(header.packet_type)
            }
        }
    }

    async fn on_open<L: Transport>(
        &mut self,
        link: &mut L,
        header: &Header,
        payload: &[u8],
    ) -> ReceiveEvent {
        // A new Open replaces whatever was in progress
        self.reset();
        self.remote_flags = header.flags;
        self.flags.remove(TransferFlags::NO_FILE_SAVE);

        let Some(descriptor) = self.open_destination(header, payload) else {
            let reply =
                Header::transfer(PacketType::OpenNack, self.flags, 0, 0, 0, header.segment_size);
            self.reply(link, reply).await;
            return ReceiveEvent::OpenRejected;
        };

        info!(
            "Receiver: Open '{}', {} bytes in {} segments",
            descriptor.name.as_str(),
            descriptor.total_length,
            descriptor.segment_count
        );
        self.descriptor = Some(descriptor);
        self.completed = None;

        let reply = Header::transfer(
            PacketType::OpenAck,
            self.flags,
            0,
            header.total_length,
            header.content_crc,
            header.segment_size,
        );
        self.reply(link, reply).await;
        ReceiveEvent::Opened
    }

    fn open_destination(&mut self, header: &Header, payload: &[u8]) -> Option<TransferDescriptor> {
        let Ok(name) = core::str::from_utf8(payload) else {
            warn!("Receiver: Open name is not UTF-8");
            return None;
        };
        let descriptor = match TransferDescriptor::new(
            name,
            header.total_length,
            header.content_crc,
            header.segment_size,
        ) {
            Ok(descriptor) => descriptor,
            Err(error) => {
                warn!("Receiver: Cannot accept '{}' ({:?})", name, error);
                return None;
            }
        };
        if let Err(error) = self.sink.open_for_write(name) {
            warn!("Receiver: Cannot open '{}' ({:?})", name, error);
            return None;
        }
        Some(descriptor)
    }

    async fn on_segment<L: Transport>(
        &mut self,
        link: &mut L,
        header: &Header,
        payload: &[u8],
        counters: &mut SessionCounters,
    ) -> ReceiveEvent {
        let segment = header.segment_number;
        self.remote_flags = header.flags;

        if self.descriptor.is_none() {
            debug!("Receiver: Segment {} with no transfer open", segment);
            self.reply(link, Header::segment(PacketType::StartNack, self.flags, 0, segment))
                .await;
            return ReceiveEvent::NotOpen(segment);
        }

        if segment == self.next_segment_expected {
            if let Err(error) = self.sink.write_segment(payload) {
                warn!("Receiver: Write of segment {} failed ({:?})", segment, error);
                self.flags.insert(TransferFlags::NO_FILE_SAVE);
            }
            self.last_segment_processed = Some(segment);
            self.next_segment_expected = segment.wrapping_add(1);
            counters.segments_received += 1;

            self.reply(link, Header::segment(PacketType::SegmentWriteAck, self.flags, 0, segment))
                .await;
            ReceiveEvent::SegmentWritten(segment)
        } else if self.last_segment_processed == Some(segment) {
            debug!("Receiver: Duplicate segment {}", segment);
            self.reply(link, Header::segment(PacketType::SegmentWriteAck, self.flags, 0, segment))
                .await;
            ReceiveEvent::Duplicate(segment)
        } else {
            let expected = self.next_segment_expected;
            info!("Receiver: Segment {} out of sequence, expected {}", segment, expected);
            self.reply(link, Header::segment(PacketType::SegmentWriteNack, self.flags, 0, expected))
                .await;
            ReceiveEvent::OutOfSequence { received: segment, expected }
        }
    }

    async fn on_close<L: Transport>(&mut self, link: &mut L, header: &Header) -> ReceiveEvent {
        self.remote_flags = header.flags;

        let Some(descriptor) = self.descriptor.take() else {
            let (total_length, content_crc) = self
                .completed
                .as_ref()
                .map_or((0, 0), |done| (done.total_length, done.content_crc));
            debug!("Receiver: Duplicate close");
            let reply = Header::transfer(
                PacketType::CloseAck,
                self.flags,
                0,
                total_length,
                content_crc,
                header.segment_size,
            );
            self.reply(link, reply).await;
            return ReceiveEvent::DuplicateClose;
        };

        let total_length = self.sink.bytes_written();
        let content_crc = if self.content_crc {
            match self.sink.compute_crc(total_length) {
                Ok(crc) => crc,
                Err(error) => {
                    warn!("Receiver: CRC of written content failed ({:?})", error);
                    self.flags.insert(TransferFlags::NO_FILE_SAVE);
                    0
                }
            }
        } else {
            0
        };
        self.sink.close();

        let transfer = ReceivedTransfer {
            name: descriptor.name,
            total_length,
            content_crc,
            expected_length: descriptor.total_length,
            expected_crc: descriptor.content_crc,
            crc_checked: self.content_crc,
            write_failed: self.flags.contains(TransferFlags::NO_FILE_SAVE),
        };
        info!(
            "Receiver: Closed '{}', {} bytes, CRC {:#06x}",
            transfer.name.as_str(),
            total_length,
            content_crc
        );
        self.completed = Some(transfer.clone());

        let reply = Header::transfer(
            PacketType::CloseAck,
            self.flags,
            0,
            total_length,
            content_crc,
            descriptor.segment_size,
        );
        self.reply(link, reply).await;
        ReceiveEvent::Closed(transfer)
    }

    async fn reply<L: Transport>(&self, link: &mut L, header: Header) {
        if let Err(error) = link.send_ack(&header.encode()).await {
            warn!("Receiver: Reply failed ({:?})", error);
        }
    }
}
