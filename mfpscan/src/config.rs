//! Driver configuration

use std::time::Duration;

use mfpscan_core::{
    DeviceFamily,
    constants::{
        DEFAULT_FLUSH_CEILING, DEFAULT_FLUSH_POLL_MS, DEFAULT_JPEG_SCRATCH_LIMIT,
        DEFAULT_STAGING_CAPACITY, DEFAULT_TIMEOUT,
    },
};

/// Smallest staging buffer, large enough for any block header
pub const MIN_STAGING_CAPACITY: usize = 64;

/// Everything a [`Scanner`](crate::Scanner) needs besides its transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub family: DeviceFamily,

    /// Deadline for one command/response exchange
    pub timeout: Duration,

    /// Wait per poll while flushing stale bytes
    pub flush_poll: Duration,

    /// Hard limit for one flush, however chatty the device is
    pub flush_ceiling: Duration,

    pub staging_capacity: usize,
    pub jpeg_scratch_limit: usize,
}

impl DriverConfig {
    pub fn new(family: DeviceFamily) -> Self {
        Self {
            family,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT),
            flush_poll: Duration::from_millis(DEFAULT_FLUSH_POLL_MS),
            flush_ceiling: Duration::from_secs(DEFAULT_FLUSH_CEILING),
            staging_capacity: DEFAULT_STAGING_CAPACITY,
            jpeg_scratch_limit: DEFAULT_JPEG_SCRATCH_LIMIT,
        }
    }

    /// Set command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_flush_poll(mut self, poll: Duration) -> Self {
        self.flush_poll = poll;
        self
    }

    pub fn with_flush_ceiling(mut self, ceiling: Duration) -> Self {
        self.flush_ceiling = ceiling;
        self
    }

    /// Set staging buffer capacity, never below [`MIN_STAGING_CAPACITY`]
    pub fn with_staging_capacity(mut self, capacity: usize) -> Self {
        self.staging_capacity = capacity.max(MIN_STAGING_CAPACITY);
        self
    }

    pub fn with_jpeg_scratch_limit(mut self, limit: usize) -> Self {
        self.jpeg_scratch_limit = limit;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new(DeviceFamily::default())
    }
}
