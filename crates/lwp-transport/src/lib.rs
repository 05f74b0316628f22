//! Owns the single TCP connection underneath a `Client`, `Producer`, or
//! `Consumer`: framing over `mio`, the request multiplexer, keepalive,
//! server-driven backpressure, and exponential-backoff reconnection.

mod config;
mod connection;
mod multiplexer;
mod state;
mod stream;

pub use config::{TransportConfig, DEFAULT_PORT};
pub use connection::{Connection, TransportEvent};
pub use state::ConnectionState;
