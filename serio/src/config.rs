use core::time::Duration;

use crate::error::{Error, Result};
use crate::flow::WaterMarks;
use crate::{
    DEFAULT_HIGH_WATER_MARK, DEFAULT_LOW_WATER_MARK, DEFAULT_POLL_INTERVAL,
    DEFAULT_POLL_WRITE_THRESHOLD, DEFAULT_READ_BUFFER_SIZE,
};

/// How the transport learns that the device is readable or writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessMode {
    /// Descriptor readiness on unix, polling elsewhere.
    #[default]
    Auto,
    /// Register the device descriptor with the reactor.
    Edge,
    /// Inspect the device buffer counters on a fixed interval.
    Poll,
}

impl ReadinessMode {
    /// Resolves `Auto` to the strategy used on this platform.
    pub fn resolve(self) -> ReadinessMode {
        match self {
            ReadinessMode::Auto if cfg!(unix) => ReadinessMode::Edge,
            ReadinessMode::Auto => ReadinessMode::Poll,
            mode => mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    pub read_buffer_size: usize,
    pub high_water_mark: usize,
    pub low_water_mark: usize,
    pub poll_interval: Duration,
    /// Poll mode only synthesizes write readiness while the device reports
    /// fewer pending output bytes than this.
    pub poll_write_threshold: u32,
    pub readiness: ReadinessMode,
}

impl TransportConfig {
    pub fn new() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_write_threshold: DEFAULT_POLL_WRITE_THRESHOLD,
            readiness: ReadinessMode::Auto,
        }
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_water_marks(mut self, high: usize, low: usize) -> Self {
        self.high_water_mark = high;
        self.low_water_mark = low;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_write_threshold(mut self, threshold: u32) -> Self {
        self.poll_write_threshold = threshold;
        self
    }

    pub fn with_readiness(mut self, mode: ReadinessMode) -> Self {
        self.readiness = mode;
        self
    }

    /// Checks the configuration before a transport is built from it.
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(Error::Configuration("read_buffer_size must be > 0".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Configuration("poll_interval must be > 0".into()));
        }
        self.water_marks().map(|_| ())
    }

    pub(crate) fn water_marks(&self) -> Result<WaterMarks> {
        WaterMarks::new(self.high_water_mark, self.low_water_mark)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}
