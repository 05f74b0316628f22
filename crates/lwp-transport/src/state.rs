/// The connection state machine (spec §4.3):
///
/// ```text
/// Disconnected → Connecting → Handshaking → Ready → Draining → Closed
///                     ↑                        ↓
///                     └────── Reconnecting ←───┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Ready,
    Reconnecting,
    Draining,
    Closed,
}

impl ConnectionState {
    /// Whether requests may be submitted for immediate transmission.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}
