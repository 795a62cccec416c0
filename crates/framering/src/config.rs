use std::time::Duration;

/// Geometry and wait tuning for a [`FrameBuffer`](crate::FrameBuffer).
#[derive(Debug, Clone, Copy)]
pub struct BufferConfig {
    /// Size of each block in bytes.
    pub block_size: usize,
    /// Number of blocks in the ring.
    pub block_count: usize,
    /// Upper bound on a single reader wait slice.
    ///
    /// A safety net against missed wakeups, not a correctness requirement:
    /// a reader that sleeps through a full slice with no progress gives up,
    /// logs, and reports "no data". Healthy operation never hits it.
    ///
    /// Default: 2 seconds.
    pub wait_timeout: Duration,
}

impl BufferConfig {
    /// Default bound on one reader wait slice.
    pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Creates a configuration for the given ring geometry.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` or `block_count` is zero.
    pub const fn new(block_size: usize, block_count: usize) -> Self {
        assert!(block_size > 0, "block_size must be non-zero");
        assert!(block_count > 0, "block_count must be non-zero");

        Self {
            block_size,
            block_count,
            wait_timeout: Self::DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Sets the reader wait slice. The bound can be tuned, not removed.
    ///
    /// # Panics
    ///
    /// Panics if `wait_timeout` is zero.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        assert!(!wait_timeout.is_zero(), "wait_timeout must be non-zero");
        self.wait_timeout = wait_timeout;
        self
    }
}
