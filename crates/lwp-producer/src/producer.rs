use std::{
    collections::HashMap,
    io,
    sync::mpsc,
    time::{Duration, Instant},
};

use lwp_protocol::{compress, encode_tlv_stream, Flags, Frame, LwpError, Opcode, Record};
use lwp_transport::{Connection, TransportEvent};
use tracing::debug;

use crate::{batch::TopicBatch, config::ProducerConfig};

/// Batched producer (spec §4.5). Owns one `Connection` plus one pending
/// batch per topic; flush triggers are buffer size, linger elapsed, an
/// explicit `flush()`, or `close()`.
///
/// Nothing here runs on a background thread: callers drive progress by
/// calling `poll` (or any of `send`/`flush`/`close`, which call it
/// internally), matching the cooperative single-task contract the whole
/// client is built on (spec §5).
pub struct Producer {
    config: ProducerConfig,
    connection: Connection,
    batches: HashMap<u32, TopicBatch>,
    in_flight: HashMap<u64, mpsc::Receiver<Result<Frame, LwpError>>>,
}

impl Producer {
    pub fn connect(config: ProducerConfig) -> Result<Self, LwpError> {
        let connection = Connection::new(config.transport.clone()).map_err(LwpError::Connection)?;
        let mut producer = Self { config, connection, batches: HashMap::new(), in_flight: HashMap::new() };
        producer.await_ready()?;
        Ok(producer)
    }

    /// Drives the underlying connection and services linger timers and
    /// in-flight ACKs. Safe to call on an idle producer.
    pub fn poll(&mut self, timeout: Duration) {
        self.drive(timeout);
        self.harvest_acks();
    }

    /// Whether the server has paused production (spec §4.3 Backpressure).
    /// While `true`, flush attempts block (`send`/`flush`) or fail with
    /// `Backpressure` (`send_async`) rather than placing a batch on the wire.
    pub fn is_paused(&self) -> bool {
        self.connection.is_paused()
    }

    /// Drives the connection and linger timers without harvesting ACKs —
    /// used by wait-loops that need to inspect one specific receiver
    /// themselves before any generic harvest can consume it.
    fn drive(&mut self, timeout: Duration) {
        for event in self.connection.poll(timeout) {
            match event {
                TransportEvent::BackpressureStarted => debug!("lwp: producer paused by server backpressure"),
                TransportEvent::BackpressureEnded => debug!("lwp: producer resuming, backpressure cleared"),
                _ => {}
            }
        }
        self.flush_lingering();
    }

    /// Appends `record` to `topic`'s batch and returns once the batch
    /// containing it has been ACKed.
    pub fn send(&mut self, topic_id: u32, record: Record) -> Result<u64, LwpError> {
        let batch_id = self.append(topic_id, record, true)?;
        self.await_ack(batch_id)
    }

    /// Appends `record` and returns as soon as it is accepted into the
    /// batch; the ACK is tracked but not awaited here.
    pub fn send_async(&mut self, topic_id: u32, record: Record) -> Result<u64, LwpError> {
        self.append(topic_id, record, false)
    }

    /// Appends every record atomically; the batch may flush immediately if
    /// it now exceeds `batch_size`.
    pub fn send_batch(&mut self, topic_id: u32, records: Vec<Record>) -> Result<u64, LwpError> {
        let batch = self.batch_mut(topic_id);
        let batch_id = batch.batch_id;
        for record in records {
            batch.push(record);
        }
        self.maybe_flush_for_size(topic_id, false)?;
        Ok(batch_id)
    }

    /// Forces emission of any partial batch on every topic and waits for
    /// every outstanding ACK. Still honors the in-flight window and
    /// server-driven backpressure (spec §4.3) — it blocks until both clear
    /// rather than pushing batches onto the wire while paused.
    pub fn flush(&mut self) -> Result<(), LwpError> {
        let topics: Vec<u32> = self.batches.keys().copied().collect();
        for topic_id in topics {
            self.flush_topic_respecting_window(topic_id, true)?;
        }
        self.await_all_acks()
    }

    /// Flushes, then drains the connection to `Closed`.
    pub fn close(mut self) -> Result<(), LwpError> {
        self.flush()?;
        self.connection.close();
        let deadline = Instant::now() + self.config.transport.request_timeout;
        while !self.connection.state().is_terminal() && Instant::now() < deadline {
            self.connection.poll(Duration::from_millis(20));
        }
        Ok(())
    }

    fn await_ready(&mut self) -> Result<(), LwpError> {
        let deadline = Instant::now() + self.config.transport.connect_timeout;
        while !self.connection.state().is_ready() {
            if Instant::now() >= deadline {
                return Err(LwpError::Connection(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")));
            }
            self.connection.poll(Duration::from_millis(20));
        }
        Ok(())
    }

    fn batch_mut(&mut self, topic_id: u32) -> &mut TopicBatch {
        self.batches
            .entry(topic_id)
            .or_insert_with(|| TopicBatch::new(self.connection.reserve_correlation_id(), self.config.linger))
    }

    fn append(&mut self, topic_id: u32, record: Record, blocking: bool) -> Result<u64, LwpError> {
        let batch = self.batch_mut(topic_id);
        let batch_id = batch.batch_id;
        batch.push(record);
        self.maybe_flush_for_size(topic_id, blocking)?;
        Ok(batch_id)
    }

    fn maybe_flush_for_size(&mut self, topic_id: u32, blocking: bool) -> Result<(), LwpError> {
        let should_flush = self.batches.get(&topic_id).is_some_and(|b| b.byte_size() >= self.config.batch_size);
        if !should_flush {
            return Ok(());
        }
        self.flush_topic_respecting_window(topic_id, blocking)
    }

    fn flush_lingering(&mut self) {
        let topics: Vec<u32> = self.batches.iter_mut().filter(|(_, b)| b.linger_elapsed()).map(|(t, _)| *t).collect();
        for topic_id in topics {
            let _ = self.flush_topic_respecting_window(topic_id, false);
        }
    }

    /// Flushes a topic's batch, honoring the bounded in-flight ACK window
    /// (spec §4.5, §8 property 6) and server-driven backpressure (spec
    /// §4.3): while the connection is paused, the write queue must not
    /// drain beyond already-accepted requests. `blocking` callers wait for
    /// the window to free up and the pause to lift; non-blocking callers
    /// fail with `Backpressure` and leave the batch intact to retry later.
    fn flush_topic_respecting_window(&mut self, topic_id: u32, blocking: bool) -> Result<(), LwpError> {
        while self.in_flight.len() >= self.config.max_pending_acks || self.connection.is_paused() {
            if !blocking {
                return Err(LwpError::Backpressure);
            }
            self.drive(Duration::from_millis(10));
            self.harvest_acks();
        }
        self.flush_topic(topic_id)
    }

    fn flush_topic(&mut self, topic_id: u32) -> Result<(), LwpError> {
        let Some(batch) = self.batches.get_mut(&topic_id) else { return Ok(()) };
        if batch.is_empty() {
            return Ok(());
        }

        let batch_id = batch.batch_id;
        let records = batch.drain();
        let uncompressed = encode_tlv_stream(&records);

        let (payload, flags) = if self.config.compression {
            match compress(&uncompressed) {
                Some(compressed) => (compressed, Flags::ACK_REQUESTED | Flags::COMPRESSED),
                None => (uncompressed, Flags::ACK_REQUESTED),
            }
        } else {
            (uncompressed, Flags::ACK_REQUESTED)
        };

        let recv = self.connection.submit_with_id(batch_id, Opcode::Produce, topic_id, 0, payload, flags)?;
        self.in_flight.insert(batch_id, recv);

        let next_id = self.connection.reserve_correlation_id();
        self.batches.get_mut(&topic_id).expect("just flushed this topic's batch").reopen(next_id);
        Ok(())
    }

    fn harvest_acks(&mut self) {
        let resolved: Vec<u64> = self
            .in_flight
            .iter()
            .filter_map(|(id, recv)| recv.try_recv().ok().map(|result| {
                if let Err(err) = result {
                    debug!(batch_id = id, ?err, "lwp: produce batch failed");
                }
                *id
            }))
            .collect();
        for id in resolved {
            self.in_flight.remove(&id);
        }
    }

    /// Waits for `batch_id`'s ACK. The batch must already have been flushed
    /// (its receiver is in `in_flight`) by the time this is called — `send`
    /// flushes eagerly via `append`, so this only blocks on linger-triggered
    /// flushes for batches still accumulating.
    fn await_ack(&mut self, batch_id: u64) -> Result<u64, LwpError> {
        let deadline = Instant::now() + self.config.transport.request_timeout;
        loop {
            if let Some(recv) = self.in_flight.get(&batch_id) {
                if let Ok(result) = recv.try_recv() {
                    self.in_flight.remove(&batch_id);
                    return result.map(|_| batch_id);
                }
            }
            if Instant::now() >= deadline {
                return Err(LwpError::Timeout);
            }
            self.drive(Duration::from_millis(10));
        }
    }

    fn await_all_acks(&mut self) -> Result<(), LwpError> {
        let deadline = Instant::now() + self.config.transport.request_timeout;
        while !self.in_flight.is_empty() {
            if Instant::now() >= deadline {
                return Err(LwpError::Timeout);
            }
            self.drive(Duration::from_millis(10));
            self.harvest_acks();
        }
        Ok(())
    }
}
