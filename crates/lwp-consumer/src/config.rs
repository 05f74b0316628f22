use std::time::Duration;

use lwp_transport::TransportConfig;

/// Where a newly-created consumer's cursor should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    Beginning,
    End,
    Offset(u64),
}

const DEFAULT_MAX_FETCH_BYTES: u32 = 1024 * 1024;
const DEFAULT_AUTO_COMMIT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub(crate) transport: TransportConfig,
    pub(crate) consumer_name: String,
    pub(crate) topic_id: u32,
    pub(crate) max_fetch_bytes: u32,
    pub(crate) start_position: StartPosition,
    pub(crate) offset_dir: Option<std::path::PathBuf>,
    pub(crate) auto_commit_interval: Duration,
    pub(crate) poll_timeout: Duration,
}

impl ConsumerConfig {
    pub fn new(host: impl Into<String>, consumer_name: impl Into<String>, topic_id: u32) -> Self {
        Self {
            transport: TransportConfig::new(host),
            consumer_name: consumer_name.into(),
            topic_id,
            max_fetch_bytes: DEFAULT_MAX_FETCH_BYTES,
            start_position: StartPosition::Beginning,
            offset_dir: None,
            auto_commit_interval: DEFAULT_AUTO_COMMIT_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
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

    pub fn with_max_fetch_bytes(mut self, max_fetch_bytes: u32) -> Self {
        self.max_fetch_bytes = max_fetch_bytes;
        self
    }

    pub fn with_start_position(mut self, start_position: StartPosition) -> Self {
        self.start_position = start_position;
        self
    }

    pub fn with_offset_dir(mut self, offset_dir: impl Into<std::path::PathBuf>) -> Self {
        self.offset_dir = Some(offset_dir.into());
        self
    }

    pub fn with_auto_commit_interval(mut self, interval: Duration) -> Self {
        self.auto_commit_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}
