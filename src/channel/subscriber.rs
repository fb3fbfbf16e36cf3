//! Per-subscriber state and delivery worker
//!
//! Each subscriber owns a bounded FIFO queue and a dedicated tokio task that
//! drains it, invoking the sink callbacks strictly sequentially. The queue is
//! a capacity-checked `VecDeque` rather than a tokio mpsc channel because
//! `DropOldest` needs sender-side eviction, which mpsc does not expose. Two
//! `Notify` handles connect the ends: `item_ready` wakes the worker on push,
//! `space_freed` wakes a `Block`-policy producer on pop. A `watch` channel
//! carries the closed/drain signal to both sides.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::config::{BackpressureStrategy, SubscriberConfig};
use super::item::DeliveryItem;
use super::sink::AudioSink;

/// Lifecycle state of a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Delivering normally
    Active,
    /// Too many consecutive callback failures; items are consumed but no
    /// longer delivered
    Errored,
    /// Unsubscribed or channel torn down (terminal)
    Stopped,
}

const STATE_ACTIVE: u8 = 0;
const STATE_ERRORED: u8 = 1;
const STATE_STOPPED: u8 = 2;

impl SubscriberState {
    fn from_u8(v: u8) -> Self {
        match v {
            STATE_ACTIVE => SubscriberState::Active,
            STATE_ERRORED => SubscriberState::Errored,
            _ => SubscriberState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SubscriberState::Active => STATE_ACTIVE,
            SubscriberState::Errored => STATE_ERRORED,
            SubscriberState::Stopped => STATE_STOPPED,
        }
    }
}

impl std::fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriberState::Active => write!(f, "active"),
            SubscriberState::Errored => write!(f, "errored"),
            SubscriberState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Live per-subscriber counters
#[derive(Debug, Default)]
pub(super) struct SubscriberStats {
    /// Items delivered via a successful callback
    pub delivered: AtomicU64,
    /// Items dropped by backpressure policy, failed attempts, or the errored state
    pub dropped: AtomicU64,
    /// Callback invocations that returned an error
    pub failed_deliveries: AtomicU64,
    /// Most recent callback error message
    pub last_error: Mutex<Option<String>>,
}

/// Point-in-time copy of one subscriber's statistics
#[derive(Debug, Clone)]
pub struct SubscriberStatsSnapshot {
    /// Subscriber name
    pub name: String,
    /// Current lifecycle state
    pub state: SubscriberState,
    /// Items delivered via a successful callback
    pub delivered: u64,
    /// Items dropped by policy, failed attempts, or the errored state
    pub dropped: u64,
    /// Callback invocations that returned an error
    pub failed_deliveries: u64,
    /// Items currently queued
    pub queued: usize,
    /// Most recent callback error message
    pub last_error: Option<String>,
}

/// Outcome of one enqueue attempt for one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EnqueueOutcome {
    /// Item is queued for delivery
    Enqueued,
    /// Item discarded by a drop policy (not a failure)
    Dropped,
    /// Attempt failed (full queue under FailFast, Block timeout, or stopped)
    Failed(&'static str),
}

/// Entry for a single subscriber registered on a channel
pub(super) struct SubscriberEntry {
    name: String,
    config: SubscriberConfig,
    sink: Arc<dyn AudioSink>,

    /// Bounded FIFO; capacity enforced under this lock
    queue: Mutex<VecDeque<DeliveryItem>>,
    /// Wakes the worker when an item is pushed
    item_ready: Notify,
    /// Wakes a blocked producer when the worker frees a slot
    space_freed: Notify,
    /// Closed/drain signal; `true` once stop or teardown begins
    closed: watch::Sender<bool>,

    state: AtomicU8,
    pub(super) stats: SubscriberStats,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriberEntry {
    pub(super) fn new(
        name: String,
        sink: Arc<dyn AudioSink>,
        config: SubscriberConfig,
    ) -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            name,
            config,
            sink,
            queue: Mutex::new(VecDeque::new()),
            item_ready: Notify::new(),
            space_freed: Notify::new(),
            closed,
            state: AtomicU8::new(STATE_ACTIVE),
            stats: SubscriberStats::default(),
            worker: Mutex::new(None),
        })
    }

    pub(super) fn name(&self) -> &str {
        &self.name
    }

    pub(super) fn state(&self) -> SubscriberState {
        SubscriberState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SubscriberState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(super) fn queued_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub(super) fn snapshot(&self) -> SubscriberStatsSnapshot {
        SubscriberStatsSnapshot {
            name: self.name.clone(),
            state: self.state(),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            failed_deliveries: self.stats.failed_deliveries.load(Ordering::Relaxed),
            queued: self.queued_len(),
            last_error: self.stats.last_error.lock().clone(),
        }
    }

    // ---- enqueue side (producer call path) ----

    /// Apply this subscriber's backpressure policy and attempt to enqueue
    pub(super) async fn enqueue(&self, item: DeliveryItem) -> EnqueueOutcome {
        if self.state() == SubscriberState::Stopped || *self.closed.borrow() {
            return EnqueueOutcome::Failed("subscriber stopped");
        }

        match self.config.strategy {
            BackpressureStrategy::Block => self.enqueue_block(item).await,
            BackpressureStrategy::DropNewest => match self.try_push(item) {
                Ok(()) => EnqueueOutcome::Enqueued,
                Err(rejected) => {
                    tracing::debug!(
                        subscriber = %self.name,
                        item = rejected.kind(),
                        "Queue full, dropping newest"
                    );
                    self.note_overflow();
                    EnqueueOutcome::Dropped
                }
            },
            BackpressureStrategy::DropOldest => {
                let evicted = {
                    let mut queue = self.queue.lock();
                    let evicted = if queue.len() >= self.config.queue_size {
                        queue.pop_front()
                    } else {
                        None
                    };
                    queue.push_back(item);
                    evicted
                };
                self.item_ready.notify_one();
                if let Some(old) = evicted {
                    tracing::debug!(
                        subscriber = %self.name,
                        evicted = old.kind(),
                        "Queue full, evicted oldest"
                    );
                    self.note_overflow();
                    EnqueueOutcome::Dropped
                } else {
                    EnqueueOutcome::Enqueued
                }
            }
            BackpressureStrategy::FailFast => match self.try_push(item) {
                Ok(()) => EnqueueOutcome::Enqueued,
                Err(rejected) => {
                    tracing::debug!(
                        subscriber = %self.name,
                        item = rejected.kind(),
                        "Queue full, failing fast"
                    );
                    self.note_overflow();
                    EnqueueOutcome::Failed("queue full")
                }
            },
        }
    }

    /// Push if there is room, handing the item back otherwise
    fn try_push(&self, item: DeliveryItem) -> Result<(), DeliveryItem> {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.config.queue_size {
                return Err(item);
            }
            queue.push_back(item);
        }
        self.item_ready.notify_one();
        Ok(())
    }

    /// Block-policy enqueue: wait for space, bounded by the configured timeout
    async fn enqueue_block(&self, mut item: DeliveryItem) -> EnqueueOutcome {
        let deadline = self
            .config
            .block_timeout
            .map(|t| tokio::time::Instant::now() + t);
        let mut closed = self.closed.subscribe();

        loop {
            match self.try_push(item) {
                Ok(()) => return EnqueueOutcome::Enqueued,
                Err(rejected) => item = rejected,
            }

            let space = self.space_freed.notified();
            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = space => {}
                        _ = closed.changed() => {
                            return EnqueueOutcome::Failed("subscriber stopped");
                        }
                        _ = tokio::time::sleep_until(deadline) => {
                            tracing::debug!(
                                subscriber = %self.name,
                                "Block enqueue timed out"
                            );
                            self.note_overflow();
                            return EnqueueOutcome::Failed("enqueue timed out");
                        }
                    }
                }
                None => {
                    tokio::select! {
                        _ = space => {}
                        _ = closed.changed() => {
                            return EnqueueOutcome::Failed("subscriber stopped");
                        }
                    }
                }
            }
        }
    }

    /// Count a dropped/failed item and fire the overflow hook if enabled
    fn note_overflow(&self) {
        let total = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.enable_overflow_callback {
            self.sink.on_overflow(total);
        }
    }

    // ---- worker side ----

    /// Spawn this subscriber's delivery worker
    pub(super) fn spawn_worker(self: &Arc<Self>) {
        let entry = Arc::clone(self);
        let handle = tokio::spawn(async move { entry.run().await });
        *self.worker.lock() = Some(handle);
    }

    /// Worker loop: pop in FIFO order, deliver sequentially, drain on close
    async fn run(self: Arc<Self>) {
        let mut closed = self.closed.subscribe();
        let mut consecutive_failures: u32 = 0;

        loop {
            let item = self.queue.lock().pop_front();
            match item {
                Some(item) => {
                    self.space_freed.notify_one();
                    self.deliver(item, &mut consecutive_failures).await;
                }
                None => {
                    // Queue drained; exit once the close signal is up
                    if *closed.borrow() {
                        break;
                    }
                    tokio::select! {
                        _ = self.item_ready.notified() => {}
                        _ = closed.changed() => {}
                    }
                }
            }
        }

        tracing::debug!(subscriber = %self.name, "Delivery worker exited");
    }

    /// Invoke the callback matching one item; errors and panics are caught
    /// and counted, never propagated
    async fn deliver(&self, item: DeliveryItem, consecutive_failures: &mut u32) {
        if self.state() == SubscriberState::Errored {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let kind = item.kind();
        let callback = AssertUnwindSafe(async {
            match &item {
                DeliveryItem::Start(meta) => self.sink.on_start(meta).await,
                DeliveryItem::Chunk(chunk) => self.sink.on_chunk(chunk).await,
                DeliveryItem::End(meta) => self.sink.on_end(meta).await,
            }
        });

        let failure = match callback.catch_unwind().await {
            Ok(Ok(())) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                *consecutive_failures = 0;
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("callback panicked: {}", panic_message(payload.as_ref())),
        };

        self.stats.failed_deliveries.fetch_add(1, Ordering::Relaxed);
        *self.stats.last_error.lock() = Some(failure.clone());
        *consecutive_failures += 1;

        tracing::warn!(
            subscriber = %self.name,
            item = kind,
            error = %failure,
            consecutive = *consecutive_failures,
            "Subscriber callback failed"
        );

        if *consecutive_failures >= self.config.error_threshold
            && self.state() == SubscriberState::Active
        {
            self.set_state(SubscriberState::Errored);
            tracing::warn!(
                subscriber = %self.name,
                failures = *consecutive_failures,
                "Subscriber entered errored state, suspending delivery"
            );
        }
    }

    // ---- teardown ----

    /// Immediate stop: abort the worker and discard queued items (unsubscribe path)
    pub(super) fn stop(&self) {
        self.set_state(SubscriberState::Stopped);
        let _ = self.closed.send(true);
        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
        }
        let discarded = {
            let mut queue = self.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        // Release a producer blocked on this subscriber's space
        self.space_freed.notify_one();
        if discarded > 0 {
            tracing::debug!(
                subscriber = %self.name,
                discarded,
                "Discarded queued items on stop"
            );
        }
    }

    /// Signal the worker to drain remaining items and exit (teardown path)
    pub(super) fn signal_drain(&self) {
        let _ = self.closed.send(true);
    }

    /// Take the worker handle for joining during teardown
    pub(super) fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker.lock().take()
    }

    /// Mark stopped and discard whatever is left (after the grace period)
    pub(super) fn finalize(&self) {
        self.set_state(SubscriberState::Stopped);
        self.queue.lock().clear();
        self.space_freed.notify_one();
    }
}

/// Best-effort text of a panic payload (`panic!` with a string or format)
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::audio::{AudioChunk, AudioMetadata};
    use crate::channel::sink::SinkResult;

    use super::*;

    /// Sink that never consumes: every callback parks on a gate
    struct ParkedSink {
        gate: tokio::sync::Semaphore,
    }

    impl ParkedSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: tokio::sync::Semaphore::new(0),
            })
        }
    }

    #[async_trait]
    impl AudioSink for ParkedSink {
        async fn on_start(&self, _metadata: &AudioMetadata) -> SinkResult {
            let _permit = self.gate.acquire().await?;
            Ok(())
        }
        async fn on_chunk(&self, _chunk: &AudioChunk) -> SinkResult {
            let _permit = self.gate.acquire().await?;
            Ok(())
        }
        async fn on_end(&self, _metadata: &AudioMetadata) -> SinkResult {
            let _permit = self.gate.acquire().await?;
            Ok(())
        }
    }

    fn chunk(ts: u64) -> DeliveryItem {
        DeliveryItem::Chunk(AudioChunk::new(Bytes::from(vec![0u8; 64]), 24_000, 1, ts))
    }

    /// Entry with no worker: the queue fills and stays full
    fn entry(config: SubscriberConfig) -> Arc<SubscriberEntry> {
        SubscriberEntry::new("sub1".to_string(), ParkedSink::new(), config)
    }

    #[tokio::test]
    async fn test_drop_newest_keeps_queued_items() {
        let entry = entry(SubscriberConfig::default().queue_size(2));

        assert_eq!(entry.enqueue(chunk(1)).await, EnqueueOutcome::Enqueued);
        assert_eq!(entry.enqueue(chunk(2)).await, EnqueueOutcome::Enqueued);
        assert_eq!(entry.enqueue(chunk(3)).await, EnqueueOutcome::Dropped);

        assert_eq!(entry.queued_len(), 2);
        assert_eq!(entry.stats.dropped.load(Ordering::Relaxed), 1);

        // Oldest items survived
        let timestamps: Vec<u64> = entry
            .queue
            .lock()
            .iter()
            .map(|item| match item {
                DeliveryItem::Chunk(c) => c.timestamp_ms,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(timestamps, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_drop_oldest_evicts_head() {
        let entry = entry(
            SubscriberConfig::default()
                .queue_size(2)
                .strategy(BackpressureStrategy::DropOldest),
        );

        assert_eq!(entry.enqueue(chunk(1)).await, EnqueueOutcome::Enqueued);
        assert_eq!(entry.enqueue(chunk(2)).await, EnqueueOutcome::Enqueued);
        assert_eq!(entry.enqueue(chunk(3)).await, EnqueueOutcome::Dropped);

        // Still exactly at capacity, head evicted, new chunk at the tail
        assert_eq!(entry.queued_len(), 2);
        let timestamps: Vec<u64> = entry
            .queue
            .lock()
            .iter()
            .map(|item| match item {
                DeliveryItem::Chunk(c) => c.timestamp_ms,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(timestamps, vec![2, 3]);
        assert_eq!(entry.stats.dropped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_leaves_queue_unchanged() {
        let entry = entry(
            SubscriberConfig::default()
                .queue_size(1)
                .strategy(BackpressureStrategy::FailFast),
        );

        assert_eq!(entry.enqueue(chunk(1)).await, EnqueueOutcome::Enqueued);
        assert_eq!(
            entry.enqueue(chunk(2)).await,
            EnqueueOutcome::Failed("queue full")
        );
        assert_eq!(entry.queued_len(), 1);
    }

    #[tokio::test]
    async fn test_block_timeout_degrades_to_failure() {
        let entry = entry(
            SubscriberConfig::default()
                .queue_size(1)
                .strategy(BackpressureStrategy::Block)
                .block_timeout(Duration::from_millis(50)),
        );

        assert_eq!(entry.enqueue(chunk(1)).await, EnqueueOutcome::Enqueued);
        let start = tokio::time::Instant::now();
        assert_eq!(
            entry.enqueue(chunk(2)).await,
            EnqueueOutcome::Failed("enqueue timed out")
        );
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(entry.queued_len(), 1);
    }

    #[tokio::test]
    async fn test_block_resumes_when_space_frees() {
        let entry = entry(
            SubscriberConfig::default()
                .queue_size(1)
                .strategy(BackpressureStrategy::Block),
        );
        assert_eq!(entry.enqueue(chunk(1)).await, EnqueueOutcome::Enqueued);

        // Free a slot shortly after the producer starts waiting
        let popper = Arc::clone(&entry);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            popper.queue.lock().pop_front();
            popper.space_freed.notify_one();
        });

        assert_eq!(entry.enqueue(chunk(2)).await, EnqueueOutcome::Enqueued);
    }

    #[tokio::test]
    async fn test_stop_unblocks_producer() {
        let entry = entry(
            SubscriberConfig::default()
                .queue_size(1)
                .strategy(BackpressureStrategy::Block),
        );
        assert_eq!(entry.enqueue(chunk(1)).await, EnqueueOutcome::Enqueued);

        let stopper = Arc::clone(&entry);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.stop();
        });

        assert_eq!(
            entry.enqueue(chunk(2)).await,
            EnqueueOutcome::Failed("subscriber stopped")
        );
        assert_eq!(entry.state(), SubscriberState::Stopped);
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_fails() {
        let entry = entry(SubscriberConfig::default());
        entry.stop();
        assert_eq!(
            entry.enqueue(chunk(1)).await,
            EnqueueOutcome::Failed("subscriber stopped")
        );
    }

    #[tokio::test]
    async fn test_snapshot_reflects_counters() {
        let entry = entry(SubscriberConfig::default().queue_size(1));
        entry.enqueue(chunk(1)).await;
        entry.enqueue(chunk(2)).await; // dropped

        let snap = entry.snapshot();
        assert_eq!(snap.name, "sub1");
        assert_eq!(snap.state, SubscriberState::Active);
        assert_eq!(snap.queued, 1);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.delivered, 0);
        assert!(snap.last_error.is_none());
    }
}
