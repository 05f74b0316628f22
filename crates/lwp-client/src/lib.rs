//! Top-level façade for the Lance Wire Protocol client: a low-level
//! request/response [`Client`] (including topic management), plus re-exports
//! of the [`Producer`] and [`Consumer`] façades built on the same transport
//! core.

mod client;
mod config;
mod topic;

pub use client::Client;
pub use config::ClientConfig;
pub use lwp_consumer::{Consumer, ConsumerConfig, FileOffsetStore, InMemoryOffsetStore, OffsetStore, StartPosition};
pub use lwp_producer::{Producer, ProducerConfig};
pub use lwp_protocol::{
    compress, crc32c, decompress, decode_tlv_stream, encode_tlv, encode_tlv_stream, Flags, Frame, FrameError,
    Header, LwpError, Opcode, Record, DEFAULT_MAX_PAYLOAD_LEN, HEADER_LEN,
};
pub use lwp_transport::{TransportConfig, DEFAULT_PORT};
pub use topic::TopicInfo;
