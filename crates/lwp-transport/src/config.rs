use std::time::Duration;

/// Fluent configuration for a single [`crate::connection::Connection`] (spec
/// §6). Shared by the `Client`, `Producer`, and `Consumer` facades, each of
/// which holds one of these.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_payload_len: u32,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: Option<u32>,
    pub keepalive_idle: Duration,
    pub keepalive_miss: Duration,
    pub backpressure_grace: Duration,
}

/// Default broker port (spec §6).
pub const DEFAULT_PORT: u16 = 1992;

impl TransportConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_payload_len: lwp_protocol::DEFAULT_MAX_PAYLOAD_LEN,
            auto_reconnect: true,
            max_reconnect_attempts: None,
            keepalive_idle: Duration::from_secs(30),
            keepalive_miss: Duration::from_secs(5),
            backpressure_grace: Duration::from_secs(30),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_payload_len(mut self, len: u32) -> Self {
        self.max_payload_len = len;
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn with_keepalive(mut self, idle: Duration, miss: Duration) -> Self {
        self.keepalive_idle = idle;
        self.keepalive_miss = miss;
        self
    }
}
