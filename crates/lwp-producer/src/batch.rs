use std::time::Duration;

use lwp_protocol::{encode_tlv, Record};
use lwp_timing::Repeater;

/// One topic's in-progress batch accumulator (spec §4.5). Tracks its own
/// byte size so `should_flush` never needs to re-encode the buffer.
pub struct TopicBatch {
    pub batch_id: u64,
    records: Vec<Record>,
    byte_size: usize,
    linger: Repeater,
    idle: bool,
}

impl TopicBatch {
    pub fn new(batch_id: u64, linger: Duration) -> Self {
        Self { batch_id, records: Vec::new(), byte_size: 0, linger: Repeater::every(linger), idle: true }
    }

    /// Appends a record. The linger timer starts on the first append after
    /// an idle state (spec §4.5) and is left running on subsequent appends.
    pub fn push(&mut self, record: Record) {
        if self.idle {
            self.linger.reset();
            self.idle = false;
        }
        self.byte_size += encode_tlv(&record).len();
        self.records.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn linger_elapsed(&mut self) -> bool {
        !self.idle && self.linger.fired()
    }

    /// Drains the accumulated records, resetting this batch back to idle.
    /// The caller is expected to assign a fresh `batch_id` via
    /// `reopen` before the next append.
    pub fn drain(&mut self) -> Vec<Record> {
        self.idle = true;
        self.byte_size = 0;
        std::mem::take(&mut self.records)
    }

    pub fn reopen(&mut self, batch_id: u64) {
        self.batch_id = batch_id;
    }
}
