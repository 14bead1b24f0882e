//! Test transports for the transfer state machines
//!
//! [`ReplyRecorder`] captures the replies a [`Receiver`] sends.
//! [`LoopbackLink`] connects a sender directly to a receiver in the same
//! process and can lose, corrupt or rewrite packets by [`Rule`].

use crate::clock::mock::ManualClock;
use crate::config::wire::HEADER_SIZE_MAX;
use crate::config::TransferConfig;
use crate::protocol::header::{Header, PacketType, TransferFlags};
use crate::storage::traits::SegmentSink;
use crate::transfer::counters::SessionCounters;
use crate::transfer::receiver::Receiver;
use crate::transfer::traits::{LinkError, Received, Transport};
use std::vec::Vec;

/// Time a request and its reply spend on air
const AIRTIME_MS: u64 = 20;

/// Transport that records replies and receives nothing
#[derive(Default)]
pub struct ReplyRecorder {
    replies: Vec<Header>,
}

impl ReplyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Header> {
        self.replies.last().copied()
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    fn take(&mut self) -> Option<Header> {
        self.replies.pop()
    }
}

impl Transport for ReplyRecorder {
    async fn transmit(&mut self, header: &[u8], payload: &[u8]) -> Result<usize, LinkError> {
        Ok(header.len() + payload.len())
    }

    async fn wait_for_ack(
        &mut self,
        _header: &mut [u8],
        _timeout_ms: u32,
    ) -> Result<usize, LinkError> {
        Err(LinkError::Timeout)
    }

    async fn receive(
        &mut self,
        _header: &mut [u8],
        _payload: &mut [u8],
        _timeout_ms: u32,
    ) -> Result<Received, LinkError> {
        Err(LinkError::Timeout)
    }

    async fn send_ack(&mut self, header: &[u8]) -> Result<(), LinkError> {
        self.replies.push(Header::decode(header));
        Ok(())
    }
}

/// What a matching [`Rule`] does to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Request never reaches the receiver
    DropRequest,
    /// Request is handled but its reply is lost
    DropReply,
    /// Request is lost, yet the sender sees a Segment-ACK for it
    LoseButAck,
    /// First payload byte is flipped before delivery
    Corrupt,
    /// Receiver restarts and forgets its transfer before delivery
    ResetReceiver,
    /// Request is handled and the reply replaced by a bare header of this type
    ReplyWith(PacketType),
    /// Request is handled and the reply replaced by a Segment-NACK
    NackWith(u16),
    /// Request is handled and the reply replaced by this Close-ACK
    CloseWith { total_length: u32, content_crc: u16 },
}

/// Fault applied to requests of one type
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    kind: PacketType,
    segment: Option<u16>,
    remaining: Option<usize>,
    action: Action,
}

impl Rule {
    /// Apply to every request of type `kind`
    pub fn new(kind: PacketType, action: Action) -> Self {
        Self {
            kind,
            segment: None,
            remaining: None,
            action,
        }
    }

    /// Apply to every transmission of segment `segment`
    pub fn segment(segment: u16, action: Action) -> Self {
        Self {
            segment: Some(segment),
            ..Self::new(PacketType::SegmentWrite, action)
        }
    }

    /// Apply only to the first `count` matches
    pub fn times(mut self, count: usize) -> Self {
        self.remaining = Some(count);
        self
    }

    fn matches(&self, header: &Header) -> bool {
        header.kind() == Some(self.kind)
            && self.segment.map_or(true, |segment| segment == header.segment_number)
            && self.remaining != Some(0)
    }
}

/// In-process link from a sender straight into a receiver
pub struct LoopbackLink<K: SegmentSink> {
    receiver: Receiver<K>,
    counters: SessionCounters,
    clock: ManualClock,
    rules: Vec<Rule>,
    sent: Vec<Header>,
    pending: Option<Header>,
}

impl<K: SegmentSink> LoopbackLink<K> {
    pub fn new(sink: K) -> Self {
        Self::with_clock(sink, ManualClock::new())
    }

    /// Link that moves `clock` forward for airtime and reply timeouts
    pub fn with_clock(sink: K, clock: ManualClock) -> Self {
        Self {
            receiver: Receiver::new(sink, &TransferConfig::default()),
            counters: SessionCounters::default(),
            clock,
            rules: Vec::new(),
            sent: Vec::new(),
            pending: None,
        }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn receiver(&self) -> &Receiver<K> {
        &self.receiver
    }

    /// Receiver-side counters
    pub fn counters(&self) -> &SessionCounters {
        &self.counters
    }

    /// Headers of every transmitted request
    pub fn sent(&self) -> &[Header] {
        &self.sent
    }

    pub fn count_sent(&self, kind: PacketType) -> usize {
        self.sent.iter().filter(|header| header.kind() == Some(kind)).count()
    }

    fn take_action(&mut self, header: &Header) -> Option<Action> {
        let rule = self.rules.iter_mut().find(|rule| rule.matches(header))?;
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(rule.action)
    }

    async fn deliver(&mut self, header: &Header, payload: &[u8]) -> Option<Header> {
        let mut recorder = ReplyRecorder::new();
        self.receiver
            .handle_packet(&mut recorder, header, payload, &mut self.counters)
            .await;
        recorder.take()
    }
}

impl<K: SegmentSink> Transport for LoopbackLink<K> {
    async fn transmit(&mut self, header: &[u8], payload: &[u8]) -> Result<usize, LinkError> {
        let decoded = Header::decode(header);
        self.sent.push(decoded);
        self.clock.advance(AIRTIME_MS);

        let mut data: Vec<u8> = payload.to_vec();
        let reply = match self.take_action(&decoded) {
            None => self.deliver(&decoded, &data).await,
            Some(Action::DropRequest) => None,
            Some(Action::DropReply) => {
                self.deliver(&decoded, &data).await;
                None
            }
            Some(Action::LoseButAck) => Some(Header::segment(
                PacketType::SegmentWriteAck,
                TransferFlags::empty(),
                0,
                decoded.segment_number,
            )),
            Some(Action::Corrupt) => {
                if let Some(byte) = data.first_mut() {
                    *byte ^= 0xFF;
                }
                self.deliver(&decoded, &data).await
            }
            Some(Action::ResetReceiver) => {
                self.receiver.reset();
                self.deliver(&decoded, &data).await
            }
            Some(Action::ReplyWith(kind)) => {
                self.deliver(&decoded, &data).await;
                Some(Header::info(kind, TransferFlags::empty()))
            }
            Some(Action::NackWith(segment)) => {
                self.deliver(&decoded, &data).await;
                Some(Header::segment(
                    PacketType::SegmentWriteNack,
                    TransferFlags::empty(),
                    0,
                    segment,
                ))
            }
            Some(Action::CloseWith {
                total_length,
                content_crc,
            }) => {
                self.deliver(&decoded, &data).await;
                Some(Header::transfer(
                    PacketType::CloseAck,
                    TransferFlags::empty(),
                    0,
                    total_length,
                    content_crc,
                    decoded.segment_size,
                ))
            }
        };
        self.pending = reply;
        Ok(header.len() + payload.len())
    }

    async fn wait_for_ack(
        &mut self,
        header: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize, LinkError> {
        let Some(reply) = self.pending.take() else {
            self.clock.advance(timeout_ms as u64);
            return Err(LinkError::Timeout);
        };
        let bytes = reply.encode();
        if bytes.len() > header.len().min(HEADER_SIZE_MAX) {
            return Err(LinkError::BufferTooSmall);
        }
        header[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    async fn receive(
        &mut self,
        _header: &mut [u8],
        _payload: &mut [u8],
        timeout_ms: u32,
    ) -> Result<Received, LinkError> {
        self.clock.advance(timeout_ms as u64);
        Err(LinkError::Timeout)
    }

    async fn send_ack(&mut self, _header: &[u8]) -> Result<(), LinkError> {
        Ok(())
    }
}
