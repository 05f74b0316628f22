use std::{
    collections::HashMap,
    io,
    sync::mpsc,
    time::{Duration, Instant},
};

use lwp_protocol::{Frame, LwpError, Opcode};
use tracing::debug;

struct PendingCompletion {
    submitted_at: Instant,
    timeout: Option<Duration>,
    sink: mpsc::Sender<Result<Frame, LwpError>>,
}

/// Maps `correlation_id -> pending_completion` (spec §4.4). Registration
/// hands out strictly monotonic ids (spec §3 invariant iii); completion is
/// triggered by a matching response, a matching error frame, request timeout,
/// or the owning connection closing.
#[derive(Default)]
pub struct Multiplexer {
    next_correlation_id: u64,
    pending: HashMap<u64, PendingCompletion>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self { next_correlation_id: 1, pending: HashMap::new() }
    }

    /// Allocates the next correlation id and registers a one-shot completion
    /// sink for it. The returned receiver completes exactly once.
    pub fn register(
        &mut self,
        timeout: Option<Duration>,
    ) -> (u64, mpsc::Receiver<Result<Frame, LwpError>>) {
        let correlation_id = self.next_correlation_id;
        self.next_correlation_id += 1;
        let recv = self.register_with_id(correlation_id, timeout);
        (correlation_id, recv)
    }

    /// Reserves a correlation id up front (the Producer's batch id, assigned
    /// at first append, before the batch is actually flushed to the wire)
    /// and registers a completion sink for it once the batch is submitted.
    pub fn reserve_id(&mut self) -> u64 {
        let id = self.next_correlation_id;
        self.next_correlation_id += 1;
        id
    }

    /// Registers a completion sink for a correlation id obtained from
    /// `reserve_id`.
    pub fn register_with_id(
        &mut self,
        correlation_id: u64,
        timeout: Option<Duration>,
    ) -> mpsc::Receiver<Result<Frame, LwpError>> {
        let (sink, recv) = mpsc::channel();
        self.pending.insert(correlation_id, PendingCompletion { submitted_at: Instant::now(), timeout, sink });
        recv
    }

    /// Routes an inbound response frame (opcode already known not to be
    /// connection-level) to its pending completion. Unknown ids are logged
    /// and dropped rather than treated as an error (spec §4.3).
    pub fn complete(&mut self, frame: Frame) {
        let Some(pending) = self.pending.remove(&frame.correlation_id) else {
            debug!(correlation_id = frame.correlation_id, "lwp: response for unknown or abandoned request, dropping");
            return;
        };
        let result = if frame.opcode == Opcode::Error { Err(decode_error_frame(&frame)) } else { Ok(frame) };
        let _ = pending.sink.send(result);
    }

    /// Marks a request as abandoned by its caller; a later `complete` call
    /// for this id silently drops the response instead of erroring.
    pub fn abandon(&mut self, correlation_id: u64) {
        self.pending.remove(&correlation_id);
    }

    /// Fails every pending completion whose deadline has elapsed with
    /// `LwpError::Timeout`.
    pub fn sweep_timeouts(&mut self) {
        let now = Instant::now();
        self.pending.retain(|_, pending| {
            let Some(timeout) = pending.timeout else { return true };
            if now.duration_since(pending.submitted_at) < timeout {
                return true;
            }
            let _ = pending.sink.send(Err(LwpError::Timeout));
            false
        });
    }

    /// Fails every outstanding completion because the connection tore down
    /// (spec §4.4 condition iv). Retryable — a caller may resubmit on the
    /// next connection.
    pub fn fail_all_closed(&mut self) {
        for (_, pending) in self.pending.drain() {
            let err = io::Error::new(io::ErrorKind::ConnectionAborted, "connection closed");
            let _ = pending.sink.send(Err(LwpError::Connection(err)));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// ERROR frame payload shape (spec §6): `code: u16` LE, followed by a UTF-8
/// reason. Unlike produce/fetch payloads this is not TLV-encoded.
fn decode_error_frame(frame: &Frame) -> LwpError {
    if frame.payload.len() < 2 {
        return LwpError::Internal("malformed error frame".to_string());
    }
    let code = u16::from_le_bytes([frame.payload[0], frame.payload[1]]);
    let message = String::from_utf8_lossy(&frame.payload[2..]).into_owned();
    LwpError::from_server_code(code, message)
}
