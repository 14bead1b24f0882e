//! Session counters

use crate::transfer::error::ErrorFlags;

/// Running counts of one session, reset by `send_file`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCounters {
    /// Segments acknowledged in the current attempt
    pub acks: u32,
    /// Missed or unusable replies in the current attempt
    pub no_acks: u32,
    /// Segment-NACK resyncs in the current attempt
    pub resyncs: u32,
    /// Segments acknowledged across all attempts
    pub segments_sent: u32,
    /// Segments accepted and written by the receiver
    pub segments_received: u32,
    /// Frames dropped by the receive loop
    pub rx_errors: u32,
    /// Whole-transfer attempts used
    pub start_attempts: u8,
    pub errors: ErrorFlags,
    pub elapsed_ms: u64,
}

impl SessionCounters {
    /// Clear everything, including the error mask
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start attempt `attempt`, clearing the per-attempt counts
    pub fn begin_attempt(&mut self, attempt: u8) {
        self.acks = 0;
        self.no_acks = 0;
        self.resyncs = 0;
        self.start_attempts = attempt;
    }
}
