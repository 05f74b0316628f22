//! Wire format for LWP v1.0: header codec, TLV records, opcodes, whole-payload
//! compression, and the closed error taxonomy. Pure and I/O-free — nothing
//! here touches a socket.

mod compression;
mod crc;
mod error;
mod frame;
mod header;
mod opcode;
mod tlv;

pub use compression::{compress, decompress};
pub use crc::crc32c;
pub use error::{FrameError, LwpError};
pub use frame::Frame;
pub use header::{Flags, Header, DEFAULT_MAX_PAYLOAD_LEN, HEADER_LEN, MAGIC, VERSION};
pub use opcode::Opcode;
pub use tlv::{decode_tlv_stream, encode_tlv, encode_tlv_stream, Record};
