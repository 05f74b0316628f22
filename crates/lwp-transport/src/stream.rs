use std::{
    collections::VecDeque,
    io::{self, IoSlice, Read, Write},
};

use lwp_protocol::{Frame, Header, HEADER_LEN};
use mio::{Interest, Registry, Token};
use tracing::{debug, warn};

/// Whether the stream can still be driven, mirroring the Transport's own
/// Ready/Reconnecting split (spec §4.3): any IO error on this type forces a
/// reconnect, never a silent retry within the stream itself.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnState {
    Alive,
    Disconnected,
}

enum RxState {
    ReadingHeader { buf: [u8; HEADER_LEN], have: usize },
    ReadingPayload { header: Header, buf: Vec<u8>, have: usize },
}

enum ReadOutcome {
    FrameDone(Frame),
    WouldBlock,
    Disconnected,
    Invalid(lwp_protocol::FrameError),
}

/// Single non-blocking LWP connection over one `mio::net::TcpStream`.
///
/// Framing: a 44-byte header (validated, CRC-checked) followed by
/// `payload_len` bytes. Mirrors the read-state-machine / write-backlog split
/// used for length-prefixed framing elsewhere in this workspace's ancestry,
/// generalized from a fixed frame header to LWP's variable payload.
pub struct FrameStream {
    stream: mio::net::TcpStream,
    token: Token,
    rx_state: RxState,
    send_backlog: VecDeque<Vec<u8>>,
    writable_armed: bool,
    max_payload_len: u32,
}

impl FrameStream {
    pub fn new(stream: mio::net::TcpStream, token: Token, max_payload_len: u32) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            token,
            rx_state: RxState::ReadingHeader { buf: [0; HEADER_LEN], have: 0 },
            send_backlog: VecDeque::with_capacity(16),
            writable_armed: false,
            max_payload_len,
        })
    }

    pub fn register(&mut self, registry: &Registry) -> io::Result<()> {
        registry.register(&mut self.stream, self.token, Interest::READABLE)
    }

    pub fn deregister(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.stream);
    }

    /// Checks the socket-level error after a WRITABLE event following
    /// `connect()`, the standard mio non-blocking connect-completion check.
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.stream.take_error()
    }

    /// Switches interest from the WRITABLE-only registration used to detect
    /// connect completion to the steady-state READABLE registration.
    pub fn reregister_readable(&mut self, registry: &Registry) -> io::Result<()> {
        registry.reregister(&mut self.stream, self.token, Interest::READABLE)
    }

    /// Drains all frames available on a single readiness event, plus any
    /// queued writes if the socket is writable.
    pub fn poll_with_readiness<F>(
        &mut self,
        registry: &Registry,
        readable: bool,
        writable: bool,
        mut on_frame: F,
    ) -> ConnState
    where
        F: FnMut(Frame),
    {
        if readable {
            loop {
                match self.read_frame() {
                    ReadOutcome::FrameDone(frame) => on_frame(frame),
                    ReadOutcome::WouldBlock => break,
                    ReadOutcome::Disconnected => return ConnState::Disconnected,
                    ReadOutcome::Invalid(err) => {
                        warn!(?err, "lwp: invalid frame, disconnecting");
                        return ConnState::Disconnected;
                    }
                }
            }
        }

        if writable {
            return self.drain_backlog(registry);
        }

        ConnState::Alive
    }

    /// Serializes `frame` and writes it immediately, or enqueues it if the
    /// socket would block.
    pub fn write_or_enqueue(&mut self, registry: &Registry, frame: &Frame) -> ConnState {
        let bytes = frame.encode();

        if !self.send_backlog.is_empty() {
            return self.enqueue_back(registry, bytes);
        }

        match self.stream.write_vectored(&[IoSlice::new(&bytes)]) {
            Ok(0) => {
                warn!("lwp: write returned 0, disconnecting");
                ConnState::Disconnected
            }
            Ok(n) if n == bytes.len() => ConnState::Alive,
            Ok(n) => self.enqueue_front(registry, bytes[n..].to_vec()),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => self.enqueue_back(registry, bytes),
            Err(err) => {
                warn!(?err, "lwp: write failed");
                ConnState::Disconnected
            }
        }
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.send_backlog.is_empty()
    }

    fn drain_backlog(&mut self, registry: &Registry) -> ConnState {
        while let Some(front) = self.send_backlog.front_mut() {
            match self.stream.write(front) {
                Ok(0) => return ConnState::Disconnected,
                Ok(n) if n == front.len() => {
                    self.send_backlog.pop_front();
                }
                Ok(n) => {
                    front.drain(..n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    debug!(?err, "lwp: write from backlog failed");
                    return ConnState::Disconnected;
                }
            }
        }

        if self.send_backlog.is_empty() && self.writable_armed {
            if let Err(err) = registry.reregister(&mut self.stream, self.token, Interest::READABLE) {
                debug!(?err, "lwp: reregister drop writable failed");
                return ConnState::Disconnected;
            }
            self.writable_armed = false;
        }

        ConnState::Alive
    }

    fn enqueue_front(&mut self, registry: &Registry, data: Vec<u8>) -> ConnState {
        self.send_backlog.push_front(data);
        self.arm_writable(registry)
    }

    fn enqueue_back(&mut self, registry: &Registry, data: Vec<u8>) -> ConnState {
        self.send_backlog.push_back(data);
        self.arm_writable(registry)
    }

    fn arm_writable(&mut self, registry: &Registry) -> ConnState {
        if !self.writable_armed {
            if let Err(err) =
                registry.reregister(&mut self.stream, self.token, Interest::READABLE | Interest::WRITABLE)
            {
                debug!(?err, "lwp: arm writable failed");
                return ConnState::Disconnected;
            }
            self.writable_armed = true;
        }
        ConnState::Alive
    }

    fn read_frame(&mut self) -> ReadOutcome {
        loop {
            match &mut self.rx_state {
                RxState::ReadingHeader { buf, have } => {
                    while *have < HEADER_LEN {
                        match self.stream.read(&mut buf[*have..]) {
                            Ok(0) => return ReadOutcome::Disconnected,
                            Ok(n) => *have += n,
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                return ReadOutcome::WouldBlock
                            }
                            Err(err) => {
                                debug!(?err, "lwp: read header failed");
                                return ReadOutcome::Disconnected;
                            }
                        }
                    }

                    let header = match Header::decode(buf, self.max_payload_len) {
                        Ok(header) => header,
                        Err(err) => return ReadOutcome::Invalid(err),
                    };
                    let payload_len = header.payload_len as usize;
                    self.rx_state =
                        RxState::ReadingPayload { header, buf: vec![0; payload_len], have: 0 };
                }

                RxState::ReadingPayload { header, buf, have } => {
                    while *have < buf.len() {
                        match self.stream.read(&mut buf[*have..]) {
                            Ok(0) => return ReadOutcome::Disconnected,
                            Ok(n) => *have += n,
                            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                                return ReadOutcome::WouldBlock
                            }
                            Err(err) => {
                                debug!(?err, "lwp: read payload failed");
                                return ReadOutcome::Disconnected;
                            }
                        }
                    }

                    let header = *header;
                    let payload = std::mem::take(buf);
                    self.rx_state = RxState::ReadingHeader { buf: [0; HEADER_LEN], have: 0 };

                    return match Frame::from_header_and_payload(header, payload) {
                        Ok(frame) => ReadOutcome::FrameDone(frame),
                        Err(err) => ReadOutcome::Invalid(err),
                    };
                }
            }
        }
    }
}
