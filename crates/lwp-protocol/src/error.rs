use thiserror::Error;

/// Malformed-frame causes (spec §4.1). These are all folded into the single
/// `InvalidFrame` kind at the `LwpError` level — once the stream desyncs,
/// the specific cause matters only for diagnostics, not for recovery.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("header crc mismatch: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch { expected: u32, actual: u32 },
    #[error("payload length {len} exceeds negotiated max {max}")]
    PayloadTooLarge { len: u32, max: u32 },
    #[error("tlv record overruns buffer")]
    TlvOverrun,
    #[error("tlv stream left {0} trailing byte(s)")]
    TlvTrailingBytes(usize),
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
}

/// The client's closed error taxonomy (spec §4.7). Every fallible operation
/// in this workspace funnels into one of these kinds; callers branch on
/// `retryable()` rather than matching on specific causes where possible.
#[derive(Error, Debug)]
pub enum LwpError {
    /// TCP reset, refused, EOF, DNS failure.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("request timed out")]
    Timeout,

    #[error("server paused production, or local in-flight window is full")]
    Backpressure,

    /// Server redirected to the current partition leader.
    #[error("not leader; redirect to {leader_addr}")]
    NotLeader { leader_addr: String },

    /// Server is still replaying and cannot yet serve the request.
    #[error("server catching up, tail is at {server_offset}")]
    ServerCatchingUp { server_offset: u64 },

    #[error("topic {0} not found")]
    TopicNotFound(String),

    #[error("access denied")]
    AccessDenied,

    /// Protocol corruption; the connection that produced this is forced to
    /// disconnect (spec §7, Fatal).
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("use after close")]
    Closed,
}

impl LwpError {
    /// Per-kind retryability, a pure function of the kind plus its carried
    /// payload (spec §4.7). `NotLeader` and `ServerCatchingUp` are retryable
    /// only in the sense that a caller who honors their hint should retry;
    /// retrying blindly against the same address is not useful.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Timeout
                | Self::Backpressure
                | Self::NotLeader { .. }
                | Self::ServerCatchingUp { .. }
        )
    }

    /// Maps a server `ERROR` frame's `code` (spec §6) to its typed kind.
    /// Codes outside the known table surface as `Internal` rather than
    /// failing the decode — an unrecognized server error is still an error.
    pub fn from_server_code(code: u16, message: String) -> Self {
        match code {
            1 => Self::TopicNotFound(message),
            2 => {
                let leader_addr = message;
                Self::NotLeader { leader_addr }
            }
            3 => {
                let server_offset = message.parse().unwrap_or(0);
                Self::ServerCatchingUp { server_offset }
            }
            4 => Self::AccessDenied,
            5 => Self::InvalidArgument(message),
            _ => Self::Internal(message),
        }
    }
}
