/// Wire opcodes for LWP v1.0 (spec §6). Exact values are taken verbatim from
/// the broker's wire definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Hello = 0x01,
    HelloAck = 0x02,
    Ping = 0x03,
    Pong = 0x04,
    Produce = 0x10,
    ProduceAck = 0x11,
    Fetch = 0x20,
    FetchResp = 0x21,
    Subscribe = 0x22,
    Unsubscribe = 0x23,
    Commit = 0x24,
    SeekEnd = 0x25,
    CreateTopic = 0x30,
    DeleteTopic = 0x31,
    ListTopics = 0x32,
    GetTopic = 0x33,
    SetRetention = 0x34,
    Backpressure = 0x40,
    Resume = 0x41,
    Error = 0xFE,
}

impl Opcode {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x01 => Self::Hello,
            0x02 => Self::HelloAck,
            0x03 => Self::Ping,
            0x04 => Self::Pong,
            0x10 => Self::Produce,
            0x11 => Self::ProduceAck,
            0x20 => Self::Fetch,
            0x21 => Self::FetchResp,
            0x22 => Self::Subscribe,
            0x23 => Self::Unsubscribe,
            0x24 => Self::Commit,
            0x25 => Self::SeekEnd,
            0x30 => Self::CreateTopic,
            0x31 => Self::DeleteTopic,
            0x32 => Self::ListTopics,
            0x33 => Self::GetTopic,
            0x34 => Self::SetRetention,
            0x40 => Self::Backpressure,
            0x41 => Self::Resume,
            0xFE => Self::Error,
            _ => return None,
        })
    }

    /// Correlation id 0 is reserved for frames the Transport handles inline
    /// rather than routing through the multiplexer (spec §4.3).
    pub const fn is_connection_level(self) -> bool {
        matches!(self, Self::Ping | Self::Pong | Self::Backpressure | Self::Resume)
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        value as u8
    }
}
