use std::time::Duration;

/// Default wait between unsuccessful frame polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default upper bound on the bytes forwarded by one extractor read.
pub const DEFAULT_SAMPLE_READ_SIZE: usize = 256 * 1024;

/// Pipeline-level tuning shared by the framer and the extractor.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// How long [`FrameFramer`](crate::framer::FrameFramer) waits after a
    /// poll that produced no new frame before polling again.
    pub poll_interval: Duration,
    /// Maximum number of bytes
    /// [`ContainerExtractor`](crate::extractor::pseudo::ContainerExtractor)
    /// peeks and forwards as a sample per read call.
    pub sample_read_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            sample_read_size: DEFAULT_SAMPLE_READ_SIZE,
        }
    }
}

impl IngestConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Clamped to at least one byte so every read makes progress.
    pub fn with_sample_read_size(mut self, sample_read_size: usize) -> Self {
        self.sample_read_size = sample_read_size.max(1);
        self
    }
}
