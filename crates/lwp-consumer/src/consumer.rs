use std::{
    io,
    time::{Duration, Instant},
};

use lwp_protocol::{decode_tlv_stream, decompress, Flags, Frame, LwpError, Opcode};
use lwp_timing::Repeater;
use lwp_transport::Connection;
use tracing::debug;

use crate::{
    config::{ConsumerConfig, StartPosition},
    cursor::{Cursor, FetchResult},
    offset_store::{FileOffsetStore, OffsetStore},
};

/// Standalone pull-consumer (spec §4.6). Owns one `Connection` plus one
/// offset cursor; fetches are request/response round trips over that single
/// connection, driven by the caller exactly like `Producer` — nothing here
/// spawns a thread.
pub struct Consumer {
    config: ConsumerConfig,
    connection: Connection,
    offset_store: Box<dyn OffsetStore>,
    cursor: Cursor,
    auto_commit: Repeater,
    last_delivered_offset: Option<u64>,
}

impl Consumer {
    /// Connects using a file-backed offset store rooted at `config.offset_dir`
    /// (or the platform default data directory if unset).
    pub fn connect(config: ConsumerConfig) -> Result<Self, LwpError> {
        let dir = config.offset_dir.clone().unwrap_or_else(lwp_utils::directories::default_offset_dir);
        Self::connect_with_store(config, Box::new(FileOffsetStore::new(dir)))
    }

    /// Connects with a caller-supplied offset store, e.g. `InMemoryOffsetStore`
    /// for tests.
    pub fn connect_with_store(config: ConsumerConfig, offset_store: Box<dyn OffsetStore>) -> Result<Self, LwpError> {
        let connection = Connection::new(config.transport.clone()).map_err(LwpError::Connection)?;
        let mut consumer = Self {
            cursor: Cursor::new(config.topic_id, 0),
            auto_commit: Repeater::every(config.auto_commit_interval),
            offset_store,
            connection,
            last_delivered_offset: None,
            config,
        };
        consumer.await_ready()?;
        consumer.cursor.next_offset = consumer.resolve_initial_offset()?;
        Ok(consumer)
    }

    pub fn topic_id(&self) -> u32 {
        self.cursor.topic_id
    }

    pub fn next_offset(&self) -> u64 {
        self.cursor.next_offset
    }

    /// Returns `{records, end_offset, lag}`, or `None` if nothing arrived
    /// within `poll_timeout_s` (spec §4.6 Poll).
    pub fn poll(&mut self) -> Result<Option<FetchResult>, LwpError> {
        let deadline = Instant::now() + self.config.poll_timeout;
        loop {
            self.maybe_auto_commit();

            match self.fetch_once(deadline) {
                Ok(frame) => {
                    if let Some(result) = self.handle_fetch_response(frame)? {
                        self.maybe_auto_commit();
                        return Ok(Some(result));
                    }
                }
                Err(LwpError::Timeout) => return Ok(None),
                Err(err) => return Err(err),
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    /// `next_offset = offset`; any unconsumed buffered records are implicitly
    /// discarded since this consumer never buffers ahead of what it hands
    /// back from `poll`.
    pub fn seek(&mut self, offset: u64) {
        self.cursor.next_offset = offset;
    }

    pub fn seek_to_beginning(&mut self) {
        self.seek(0);
    }

    pub fn rewind(&mut self) {
        self.seek(0);
    }

    /// Issues a SEEK_END request; the server replies with the topic's tail
    /// offset, which becomes the new cursor position.
    pub fn seek_to_end(&mut self) -> Result<u64, LwpError> {
        let frame = self.connection.request(Opcode::SeekEnd, self.cursor.topic_id, 0, Vec::new(), Flags::empty())?;
        let tail = frame.offset;
        self.cursor.next_offset = tail;
        Ok(tail)
    }

    /// Persists the last delivered offset to the configured offset store
    /// only (spec §9 open question ii).
    pub fn commit(&mut self) -> Result<(), LwpError> {
        let Some(offset) = self.last_delivered_offset else { return Ok(()) };
        self.offset_store
            .store(&self.config.consumer_name, self.cursor.topic_id, offset)
            .map_err(|err| LwpError::Internal(err.to_string()))
    }

    /// Persists locally, then also sends a COMMIT frame so the server tracks
    /// this consumer's position remotely.
    pub fn commit_offset(&mut self) -> Result<(), LwpError> {
        self.commit()?;
        let Some(offset) = self.last_delivered_offset else { return Ok(()) };
        self.connection.request(Opcode::Commit, self.cursor.topic_id, offset, Vec::new(), Flags::empty())?;
        Ok(())
    }

    /// Drives the underlying connection without issuing a fetch; useful for
    /// callers that want to service keepalive/reconnect between polls.
    pub fn drive(&mut self, timeout: Duration) {
        self.connection.poll(timeout);
    }

    /// Commits once more, then drains the connection to `Closed`.
    pub fn close(mut self) -> Result<(), LwpError> {
        let _ = self.commit();
        self.connection.close();
        let deadline = Instant::now() + self.config.transport.request_timeout;
        while !self.connection.state().is_terminal() && Instant::now() < deadline {
            self.connection.poll(Duration::from_millis(20));
        }
        Ok(())
    }

    fn resolve_initial_offset(&mut self) -> Result<u64, LwpError> {
        match self.config.start_position {
            StartPosition::Beginning => {
                let stored = self
                    .offset_store
                    .load(&self.config.consumer_name, self.config.topic_id)
                    .map_err(|err| LwpError::Internal(err.to_string()))?;
                Ok(stored.unwrap_or(0))
            }
            StartPosition::End => self.seek_to_end(),
            StartPosition::Offset(n) => Ok(n),
        }
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

    /// Submits one FETCH request and waits for its response (or a typed
    /// error) up to `deadline`.
    fn fetch_once(&mut self, deadline: Instant) -> Result<Frame, LwpError> {
        let request_payload = self.config.max_fetch_bytes.to_le_bytes().to_vec();
        let (_, recv) =
            self.connection.submit(Opcode::Fetch, self.cursor.topic_id, self.cursor.next_offset, request_payload, Flags::empty())?;
        loop {
            if let Ok(result) = recv.try_recv() {
                return result;
            }
            if Instant::now() >= deadline {
                return Err(LwpError::Timeout);
            }
            self.connection.poll(Duration::from_millis(10));
        }
    }

    /// Decodes a FETCH_RESP payload (decompressing first if flagged),
    /// advances the cursor by the server-reported byte count, and computes
    /// lag against the tail offset the response carries in its `offset`
    /// field. Returns `None` when the response carried zero records so
    /// `poll` keeps waiting out its deadline instead of handing back an
    /// empty yield.
    fn handle_fetch_response(&mut self, frame: Frame) -> Result<Option<FetchResult>, LwpError> {
        if frame.opcode != Opcode::FetchResp {
            return Err(LwpError::Internal(format!("unexpected response opcode {:?} to FETCH", frame.opcode)));
        }

        let decoded_payload = if frame.flags.contains(Flags::COMPRESSED) {
            decompress(&frame.payload).map_err(|err| LwpError::Internal(err.to_string()))?
        } else {
            frame.payload
        };
        let records = decode_tlv_stream(&decoded_payload)?;
        if records.is_empty() {
            return Ok(None);
        }

        let consumed = decoded_payload.len() as u64;
        self.cursor.next_offset += consumed;
        self.last_delivered_offset = Some(self.cursor.next_offset);

        let server_tail = frame.offset;
        let lag = server_tail.saturating_sub(self.cursor.next_offset);
        Ok(Some(FetchResult { records, end_offset: self.cursor.next_offset, lag }))
    }

    fn maybe_auto_commit(&mut self) {
        if self.auto_commit.fired() {
            if let Err(err) = self.commit() {
                debug!(?err, "lwp: auto-commit failed");
            }
        }
    }
}
