//! Runtime knobs for stubs and skeletons.
//!
//! Configuration is local: it never takes part in stub identity and is not
//! carried when a stub is serialized.

use std::time::Duration;

/// Default limit on one encoded frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubConfig {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Time allowed from sending the call until the outcome arrives.
    /// `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
    pub max_frame_len: usize,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            call_timeout: Some(Duration::from_secs(30)),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl StubConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonConfig {
    /// Time a connection gets to deliver its call frame.
    pub read_timeout: Duration,
    /// Upper bound on connections being served at once. Connections past the
    /// bound wait in accept order.
    pub max_in_flight: Option<usize>,
    pub max_frame_len: usize,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            max_in_flight: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl SkeletonConfig {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit.max(1));
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}
