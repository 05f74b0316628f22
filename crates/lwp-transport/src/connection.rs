use std::{
    io,
    net::SocketAddr,
    sync::mpsc,
    time::{Duration, Instant},
};

use lwp_protocol::{Flags, Frame, LwpError, Opcode, Record};
use lwp_timing::Backoff;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};

use crate::{config::TransportConfig, multiplexer::Multiplexer, state::ConnectionState, stream::{ConnState, FrameStream}};

const STREAM_TOKEN: Token = Token(0);

/// Notable occurrences a caller should react to between `poll` calls.
#[derive(Debug)]
pub enum TransportEvent {
    Ready,
    Reconnecting { attempt: u32 },
    Closed,
    BackpressureStarted,
    BackpressureEnded,
}

/// Owns one TCP connection and drives its state machine (spec §4.3). All IO
/// happens inside `poll`; nothing here spawns a thread or an async task —
/// the caller is the single read/write task the spec's concurrency model
/// requires.
pub struct Connection {
    config: TransportConfig,
    addr: SocketAddr,
    poll: Poll,
    events: Events,
    state: ConnectionState,
    stream: Option<FrameStream>,
    backoff: Backoff,
    next_attempt_at: Instant,
    last_inbound: Instant,
    pong_deadline: Option<Instant>,
    multiplexer: Multiplexer,
    paused: bool,
    backpressure_deadline: Option<Instant>,
    draining_deadline: Option<Instant>,
    reconnect_attempts_since_ready: u32,
}

impl Connection {
    pub fn new(config: TransportConfig) -> io::Result<Self> {
        let addr = resolve(&config.host, config.port)?;
        Ok(Self {
            config,
            addr,
            poll: Poll::new()?,
            events: Events::with_capacity(64),
            state: ConnectionState::Disconnected,
            stream: None,
            backoff: Backoff::new(),
            next_attempt_at: Instant::now(),
            last_inbound: Instant::now(),
            pong_deadline: None,
            multiplexer: Multiplexer::new(),
            paused: false,
            backpressure_deadline: None,
            draining_deadline: None,
            reconnect_attempts_since_ready: 0,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pending_request_count(&self) -> usize {
        self.multiplexer.pending_count()
    }

    /// Drives one iteration of the reactor: attempts (re)connection if due,
    /// polls the socket with `timeout`, dispatches frames, and services
    /// keepalive/backoff/drain timers. Returns the transport-level events
    /// observed during this call.
    pub fn poll(&mut self, timeout: Duration) -> Vec<TransportEvent> {
        let mut out = Vec::new();

        if matches!(self.state, ConnectionState::Disconnected | ConnectionState::Reconnecting)
            && Instant::now() >= self.next_attempt_at
        {
            let is_reconnect = self.state == ConnectionState::Reconnecting;
            self.attempt_connect(is_reconnect, &mut out);
        }

        if self.stream.is_some() {
            if let Err(err) = self.poll.poll(&mut self.events, Some(timeout)) {
                warn!(?err, "lwp: mio poll failed");
            } else {
                self.dispatch_events(&mut out);
            }
        }

        self.service_keepalive(&mut out);
        self.service_backpressure_grace(&mut out);
        self.service_draining(&mut out);
        self.multiplexer.sweep_timeouts();

        out
    }

    /// Submits a request frame and registers it with the multiplexer.
    /// Returns the assigned correlation id and a receiver that completes
    /// exactly once (response, error, timeout, or connection close).
    pub fn submit(
        &mut self,
        opcode: Opcode,
        topic_id: u32,
        offset: u64,
        payload: Vec<u8>,
        flags: Flags,
    ) -> Result<(u64, mpsc::Receiver<Result<Frame, LwpError>>), LwpError> {
        let correlation_id = self.reserve_correlation_id();
        let recv = self.submit_with_id(correlation_id, opcode, topic_id, offset, payload, flags)?;
        Ok((correlation_id, recv))
    }

    /// Reserves a correlation id without submitting anything yet. Used by
    /// the Producer, which must hand a caller a batch id at first append,
    /// before the batch is actually flushed to the wire (spec §4.5).
    pub fn reserve_correlation_id(&mut self) -> u64 {
        self.multiplexer.reserve_id()
    }

    /// Submits a frame under a correlation id obtained from
    /// `reserve_correlation_id`.
    pub fn submit_with_id(
        &mut self,
        correlation_id: u64,
        opcode: Opcode,
        topic_id: u32,
        offset: u64,
        payload: Vec<u8>,
        flags: Flags,
    ) -> Result<mpsc::Receiver<Result<Frame, LwpError>>, LwpError> {
        if !self.state.is_ready() {
            return Err(LwpError::Connection(io::Error::new(io::ErrorKind::NotConnected, "not ready")));
        }
        let recv = self.multiplexer.register_with_id(correlation_id, Some(self.config.request_timeout));
        let frame = Frame::new(opcode, correlation_id, topic_id, offset, payload).with_flags(flags);
        let Some(stream) = self.stream.as_mut() else {
            lwp_utils::safe_panic!("lwp: state is Ready but no stream is set");
            self.multiplexer.abandon(correlation_id);
            return Err(LwpError::Connection(io::Error::new(io::ErrorKind::NotConnected, "no stream")));
        };
        if stream.write_or_enqueue(self.poll.registry(), &frame) == ConnState::Disconnected {
            self.multiplexer.abandon(correlation_id);
            self.begin_reconnect();
            return Err(LwpError::Connection(io::Error::new(io::ErrorKind::BrokenPipe, "write failed")));
        }
        Ok(recv)
    }

    /// Blocking convenience: submits and drives `poll` until the response
    /// arrives or `deadline` elapses.
    pub fn request(
        &mut self,
        opcode: Opcode,
        topic_id: u32,
        offset: u64,
        payload: Vec<u8>,
        flags: Flags,
    ) -> Result<Frame, LwpError> {
        let (_, recv) = self.submit(opcode, topic_id, offset, payload, flags)?;
        let deadline = Instant::now() + self.config.request_timeout;
        loop {
            if let Ok(result) = recv.try_recv() {
                return result;
            }
            if Instant::now() >= deadline {
                return Err(LwpError::Timeout);
            }
            self.poll(Duration::from_millis(20));
        }
    }

    /// Abandons a pending request; a late response is drained and discarded
    /// by the multiplexer (spec §4.3 Cancellation).
    pub fn abandon(&mut self, correlation_id: u64) {
        self.multiplexer.abandon(correlation_id);
    }

    /// Begins a graceful close: outstanding responses get up to
    /// `request_timeout` to complete, then the connection is forced Closed.
    pub fn close(&mut self) {
        if self.state.is_ready() {
            self.state = ConnectionState::Draining;
            self.draining_deadline = Some(Instant::now() + self.config.request_timeout);
        } else {
            self.force_closed();
        }
    }

    fn attempt_connect(&mut self, is_reconnect: bool, out: &mut Vec<TransportEvent>) {
        self.state = ConnectionState::Connecting;
        match mio::net::TcpStream::connect(self.addr) {
            Ok(mut raw) => {
                if let Err(err) =
                    self.poll.registry().register(&mut raw, STREAM_TOKEN, Interest::WRITABLE)
                {
                    warn!(?err, "lwp: couldn't register new connection");
                    self.begin_reconnect();
                    return;
                }
                match FrameStream::new(raw, STREAM_TOKEN, self.config.max_payload_len) {
                    Ok(stream) => self.stream = Some(stream),
                    Err(err) => {
                        warn!(?err, "lwp: couldn't wrap connected socket");
                        self.begin_reconnect();
                        return;
                    }
                }
            }
            Err(err) => {
                debug!(?err, addr = ?self.addr, "lwp: connect failed");
                self.begin_reconnect();
                return;
            }
        }
        if is_reconnect {
            out.push(TransportEvent::Reconnecting { attempt: self.backoff.attempt() });
        }
    }

    fn dispatch_events(&mut self, out: &mut Vec<TransportEvent>) {
        let relevant: Vec<(Token, bool, bool)> = self
            .events
            .iter()
            .filter(|ev| ev.token() == STREAM_TOKEN)
            .map(|ev| (ev.token(), ev.is_readable(), ev.is_writable()))
            .collect();

        for (_, readable, writable) in relevant {
            if self.state == ConnectionState::Connecting {
                if self.finish_connecting() {
                    self.send_hello();
                } else {
                    self.begin_reconnect();
                    continue;
                }
            }

            let mut inbound = Vec::new();
            let conn_state = {
                let Some(stream) = self.stream.as_mut() else {
                    lwp_utils::safe_panic!("lwp: dispatch_events ran with no stream set");
                    self.begin_reconnect();
                    continue;
                };
                stream.poll_with_readiness(self.poll.registry(), readable, writable, |frame| inbound.push(frame))
            };

            for frame in inbound {
                self.handle_inbound(frame, out);
            }

            if conn_state == ConnState::Disconnected {
                self.begin_reconnect();
            }
        }
    }

    fn finish_connecting(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else { return false };
        match stream.take_error() {
            Ok(None) => {
                if stream.reregister_readable(self.poll.registry()).is_err() {
                    return false;
                }
                self.state = ConnectionState::Handshaking;
                true
            }
            _ => false,
        }
    }

    fn send_hello(&mut self) {
        let hello = Frame::new(Opcode::Hello, 0, 0, 0, lwp_protocol::encode_tlv(&Record::RawData(vec![1])));
        if let Some(stream) = self.stream.as_mut() {
            if stream.write_or_enqueue(self.poll.registry(), &hello) == ConnState::Disconnected {
                self.begin_reconnect();
            }
        }
    }

    fn handle_inbound(&mut self, frame: Frame, out: &mut Vec<TransportEvent>) {
        self.last_inbound = Instant::now();

        match frame.opcode {
            Opcode::HelloAck if self.state == ConnectionState::Handshaking => {
                self.state = ConnectionState::Ready;
                self.backoff.reset();
                self.reconnect_attempts_since_ready = 0;
                out.push(TransportEvent::Ready);
            }
            Opcode::Ping => self.reply_pong(),
            Opcode::Pong => self.pong_deadline = None,
            Opcode::Backpressure => {
                if !self.paused {
                    self.paused = true;
                    self.backpressure_deadline = Some(Instant::now() + self.config.backpressure_grace);
                    out.push(TransportEvent::BackpressureStarted);
                }
            }
            Opcode::Resume => {
                if self.paused {
                    self.paused = false;
                    self.backpressure_deadline = None;
                    out.push(TransportEvent::BackpressureEnded);
                }
            }
            _ => {
                lwp_utils::safe_assert!(!frame.opcode.is_connection_level(), "connection-level opcode fell through to the multiplexer: {:?}", frame.opcode);
                self.multiplexer.complete(frame);
            }
        }
    }

    fn reply_pong(&mut self) {
        let pong = Frame::new(Opcode::Pong, 0, 0, 0, Vec::new());
        if let Some(stream) = self.stream.as_mut() {
            let _ = stream.write_or_enqueue(self.poll.registry(), &pong);
        }
    }

    fn service_keepalive(&mut self, _out: &mut [TransportEvent]) {
        if !self.state.is_ready() {
            return;
        }

        if let Some(deadline) = self.pong_deadline {
            if Instant::now() >= deadline {
                warn!("lwp: keepalive miss, reconnecting");
                self.begin_reconnect();
                return;
            }
        } else if self.last_inbound.elapsed() >= self.config.keepalive_idle {
            let ping = Frame::new(Opcode::Ping, 0, 0, 0, Vec::new());
            if let Some(stream) = self.stream.as_mut() {
                if stream.write_or_enqueue(self.poll.registry(), &ping) == ConnState::Disconnected {
                    self.begin_reconnect();
                    return;
                }
            }
            self.pong_deadline = Some(Instant::now() + self.config.keepalive_miss);
        }
    }

    fn service_backpressure_grace(&mut self, out: &mut Vec<TransportEvent>) {
        if self.paused {
            if let Some(deadline) = self.backpressure_deadline {
                if Instant::now() >= deadline {
                    info!("lwp: backpressure grace elapsed, resuming");
                    self.paused = false;
                    self.backpressure_deadline = None;
                    out.push(TransportEvent::BackpressureEnded);
                }
            }
        }
    }

    fn service_draining(&mut self, out: &mut Vec<TransportEvent>) {
        if self.state != ConnectionState::Draining {
            return;
        }
        let drained = self.multiplexer.pending_count() == 0;
        let expired = self.draining_deadline.is_some_and(|d| Instant::now() >= d);
        if drained || expired {
            self.force_closed();
            out.push(TransportEvent::Closed);
        }
    }

    fn force_closed(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.deregister(self.poll.registry());
        }
        self.multiplexer.fail_all_closed();
        self.state = ConnectionState::Closed;
    }

    fn begin_reconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.deregister(self.poll.registry());
        }
        self.multiplexer.fail_all_closed();
        self.pong_deadline = None;

        if !self.config.auto_reconnect {
            self.state = ConnectionState::Closed;
            return;
        }
        if let Some(max) = self.config.max_reconnect_attempts {
            self.reconnect_attempts_since_ready += 1;
            if self.reconnect_attempts_since_ready > max {
                self.state = ConnectionState::Closed;
                return;
            }
        }

        self.state = ConnectionState::Reconnecting;
        self.next_attempt_at = Instant::now() + self.backoff.next_delay();
    }
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    use std::net::ToSocketAddrs;
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no address for {host}:{port}")))
}
