//! Channel and subscriber configuration

use std::time::Duration;

use super::error::ChannelError;

/// Policy applied when a subscriber's bounded queue is full at publish time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressureStrategy {
    /// Wait until space is available, optionally bounded by
    /// [`SubscriberConfig::block_timeout`]. On timeout the attempt is
    /// treated as a `FailFast` outcome for this call.
    Block,
    /// Discard the incoming item for this subscriber; queued items untouched
    #[default]
    DropNewest,
    /// Evict the oldest queued item and enqueue the new one
    DropOldest,
    /// Enqueue nothing and mark this subscriber's contribution failed
    FailFast,
}

impl std::fmt::Display for BackpressureStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackpressureStrategy::Block => write!(f, "block"),
            BackpressureStrategy::DropNewest => write!(f, "drop-newest"),
            BackpressureStrategy::DropOldest => write!(f, "drop-oldest"),
            BackpressureStrategy::FailFast => write!(f, "fail-fast"),
        }
    }
}

/// Per-subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Bounded queue capacity in items (must be >= 1)
    pub queue_size: usize,

    /// Policy applied when the queue is full
    pub strategy: BackpressureStrategy,

    /// Fire the sink's `on_overflow` hook when an item is dropped or an
    /// enqueue attempt fails for this subscriber
    pub enable_overflow_callback: bool,

    /// Upper bound on how long a `Block` enqueue waits for space
    /// (None = wait indefinitely; ignored by the other strategies)
    pub block_timeout: Option<Duration>,

    /// Consecutive callback failures before the subscriber enters the
    /// errored state and delivery attempts stop
    pub error_threshold: u32,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            queue_size: 32,
            strategy: BackpressureStrategy::default(),
            enable_overflow_callback: false,
            block_timeout: None,
            error_threshold: 3,
        }
    }
}

impl SubscriberConfig {
    /// Set the queue capacity
    pub fn queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    /// Set the backpressure strategy
    pub fn strategy(mut self, strategy: BackpressureStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable the overflow callback
    pub fn with_overflow_callback(mut self) -> Self {
        self.enable_overflow_callback = true;
        self
    }

    /// Bound `Block` enqueue waits by a timeout
    pub fn block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = Some(timeout);
        self
    }

    /// Set the consecutive-failure threshold for the errored state
    pub fn error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold.max(1);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.queue_size < 1 {
            return Err(ChannelError::InvalidConfig(format!(
                "queue_size must be >= 1, got {}",
                self.queue_size
            )));
        }
        Ok(())
    }
}

/// Channel-level configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// How long `close()` waits for workers to drain before aborting them
    pub shutdown_grace: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl ChannelConfig {
    /// Set the shutdown grace period
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}
