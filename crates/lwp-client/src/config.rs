use std::time::Duration;

use lwp_transport::TransportConfig;

/// Fluent configuration for the low-level [`crate::Client`] (spec §6).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub(crate) transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self { transport: TransportConfig::new(host) }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.transport = self.transport.with_port(port);
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
