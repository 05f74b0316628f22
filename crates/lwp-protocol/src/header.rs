use bitflags::bitflags;
use tracing::trace;

use crate::{crc::crc32c, error::FrameError};

/// Constant identifier validated on every frame.
pub const MAGIC: [u8; 4] = *b"LWP1";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 44;
/// Negotiated default; a header claiming more is a fatal protocol error.
pub const DEFAULT_MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

bitflags! {
    /// Header flag bits (spec §3).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Flags: u16 {
        const COMPRESSED     = 0b0000_0001;
        const RESPONSE       = 0b0000_0010;
        const ACK_REQUESTED  = 0b0000_0100;
        const BACKPRESSURE   = 0b0000_1000;
        const KEEPALIVE      = 0b0001_0000;
        const END_OF_STREAM  = 0b0010_0000;
    }
}

/// The fixed 44-byte frame header (spec §3). Payload bytes, if any, follow
/// immediately on the wire and are not part of this type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub opcode_raw: u8,
    pub flags: Flags,
    pub correlation_id: u64,
    pub topic_id: u32,
    pub offset: u64,
    pub payload_len: u32,
}

impl Header {
    pub fn new(opcode_raw: u8, correlation_id: u64, topic_id: u32, offset: u64, payload_len: u32) -> Self {
        Self { opcode_raw, flags: Flags::empty(), correlation_id, topic_id, offset, payload_len }
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Encodes this header to its 44-byte little-endian wire form, including
    /// a freshly computed CRC32C trailer.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        let mut w = &mut buf[..];

        write_bytes(&mut w, &MAGIC);
        write_u8(&mut w, VERSION);
        write_u8(&mut w, self.opcode_raw);
        write_u16(&mut w, self.flags.bits());
        write_u64(&mut w, self.correlation_id);
        write_u32(&mut w, self.topic_id);
        write_u64(&mut w, self.offset);
        write_u32(&mut w, self.payload_len);
        write_u64(&mut w, 0); // reserved
        debug_assert_eq!(w.len(), 4, "only the crc field should remain");

        let crc = crc32c(&buf[..HEADER_LEN - 4]);
        buf[HEADER_LEN - 4..].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes and validates a 44-byte header (spec §4.1 invariant i).
    ///
    /// `max_payload_len` enforces invariant (ii) without reading any payload
    /// bytes — callers should check this before attempting to read
    /// `payload_len` more bytes off the wire.
    pub fn decode(bytes: &[u8; HEADER_LEN], max_payload_len: u32) -> Result<Self, FrameError> {
        if bytes[0..4] != MAGIC {
            trace!(?bytes, "lwp: header decode rejected bad magic");
            return Err(FrameError::BadMagic);
        }
        if bytes[4] != VERSION {
            trace!(version = bytes[4], "lwp: header decode rejected unsupported version");
            return Err(FrameError::UnsupportedVersion(bytes[4]));
        }

        let expected_crc = u32::from_le_bytes(bytes[HEADER_LEN - 4..].try_into().unwrap());
        let actual_crc = crc32c(&bytes[..HEADER_LEN - 4]);
        if expected_crc != actual_crc {
            trace!(expected_crc, actual_crc, "lwp: header decode rejected crc mismatch");
            return Err(FrameError::CrcMismatch { expected: expected_crc, actual: actual_crc });
        }

        let opcode_raw = bytes[5];
        let flags = Flags::from_bits_truncate(u16::from_le_bytes(bytes[6..8].try_into().unwrap()));
        let correlation_id = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let topic_id = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let offset = u64::from_le_bytes(bytes[20..28].try_into().unwrap());
        let payload_len = u32::from_le_bytes(bytes[28..32].try_into().unwrap());

        if payload_len > max_payload_len {
            trace!(payload_len, max_payload_len, "lwp: header decode rejected oversized payload");
            return Err(FrameError::PayloadTooLarge { len: payload_len, max: max_payload_len });
        }

        Ok(Self { opcode_raw, flags, correlation_id, topic_id, offset, payload_len })
    }
}

#[inline]
fn write_bytes(w: &mut &mut [u8], bytes: &[u8]) {
    let (head, tail) = std::mem::take(w).split_at_mut(bytes.len());
    head.copy_from_slice(bytes);
    *w = tail;
}

#[inline]
fn write_u8(w: &mut &mut [u8], v: u8) {
    write_bytes(w, &[v]);
}

#[inline]
fn write_u16(w: &mut &mut [u8], v: u16) {
    write_bytes(w, &v.to_le_bytes());
}

#[inline]
fn write_u32(w: &mut &mut [u8], v: u32) {
    write_bytes(w, &v.to_le_bytes());
}

#[inline]
fn write_u64(w: &mut &mut [u8], v: u64) {
    write_bytes(w, &v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;

    fn sample() -> Header {
        Header::new(Opcode::Produce.into(), 42, 7, 0, 9).with_flags(Flags::ACK_REQUESTED)
    }

    #[test]
    fn round_trip() {
        let h = sample();
        let bytes = h.encode();
        let decoded = Header::decode(&bytes, DEFAULT_MAX_PAYLOAD_LEN).expect("valid header");
        assert_eq!(h, decoded);
    }

    #[test]
    fn bit_flip_breaks_crc() {
        let mut bytes = sample().encode();
        bytes[12] ^= 0x01;
        let err = Header::decode(&bytes, DEFAULT_MAX_PAYLOAD_LEN).unwrap_err();
        assert!(matches!(err, FrameError::CrcMismatch { .. }));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample().encode();
        bytes[0] = b'X';
        assert!(matches!(Header::decode(&bytes, DEFAULT_MAX_PAYLOAD_LEN), Err(FrameError::BadMagic)));
    }

    #[test]
    fn rejects_oversized_payload_without_reading_further() {
        let h = Header::new(Opcode::Produce.into(), 1, 1, 0, DEFAULT_MAX_PAYLOAD_LEN + 1);
        let bytes = h.encode();
        let err = Header::decode(&bytes, DEFAULT_MAX_PAYLOAD_LEN).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }
}
