use crate::{
    error::FrameError,
    header::{Flags, Header, HEADER_LEN},
    opcode::Opcode,
};

/// A decoded frame: header fields plus undecoded payload bytes. Payload TLV
/// decoding is deferred to callers so a frame destined for, say, the
/// multiplexer's drop path never pays for a TLV parse it doesn't need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub flags: Flags,
    pub correlation_id: u64,
    pub topic_id: u32,
    pub offset: u64,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: Opcode, correlation_id: u64, topic_id: u32, offset: u64, payload: Vec<u8>) -> Self {
        Self { opcode, flags: Flags::empty(), correlation_id, topic_id, offset, payload }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Encodes header and payload into one contiguous buffer ready to write
    /// to the socket.
    pub fn encode(&self) -> Vec<u8> {
        let header = Header::new(
            self.opcode.into(),
            self.correlation_id,
            self.topic_id,
            self.offset,
            self.payload.len() as u32,
        )
        .with_flags(self.flags);

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decodes a frame from an already-validated header and its exact
    /// payload slice. Transport is responsible for reading exactly
    /// `header.payload_len` bytes before calling this.
    pub fn from_header_and_payload(header: Header, payload: Vec<u8>) -> Result<Self, FrameError> {
        let opcode = Opcode::from_u8(header.opcode_raw).ok_or(FrameError::UnknownOpcode(header.opcode_raw))?;
        Ok(Self {
            opcode,
            flags: header.flags,
            correlation_id: header.correlation_id,
            topic_id: header.topic_id,
            offset: header.offset,
            payload,
        })
    }
}
