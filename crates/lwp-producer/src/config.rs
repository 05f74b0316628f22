use std::time::Duration;

use lwp_transport::TransportConfig;

/// Fluent configuration for a [`crate::Producer`] (spec §6).
#[derive(Clone, Debug)]
pub struct ProducerConfig {
    pub transport: TransportConfig,
    pub batch_size: usize,
    pub linger: Duration,
    pub compression: bool,
    pub max_pending_acks: usize,
}

impl ProducerConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::new(host),
            batch_size: 16 * 1024,
            linger: Duration::from_millis(10),
            compression: false,
            max_pending_acks: 16,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.transport = self.transport.with_port(port);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_linger_ms(mut self, linger_ms: u64) -> Self {
        self.linger = Duration::from_millis(linger_ms);
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn with_max_pending_acks(mut self, max_pending_acks: usize) -> Self {
        self.max_pending_acks = max_pending_acks;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.with_connect_timeout(timeout);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.with_request_timeout(timeout);
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.transport = self.transport.with_auto_reconnect(enabled);
        self
    }
}
