//! Audio broadcast channel
//!
//! The single broadcast point: one producer per channel calls
//! `notify_start` / `publish` / `notify_end`, and every registered
//! subscriber receives the items through its own bounded queue according to
//! its own backpressure policy. The subscriber registry is the only state
//! shared across callers; publish snapshots it under a read lock and then
//! works on the snapshot, so subscribe/unsubscribe may run concurrently with
//! in-flight publishes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::RwLock;

use crate::audio::{AudioChunk, AudioMetadata};

use super::config::{ChannelConfig, SubscriberConfig};
use super::error::ChannelError;
use super::item::DeliveryItem;
use super::sink::AudioSink;
use super::subscriber::{EnqueueOutcome, SubscriberEntry, SubscriberStatsSnapshot};

/// Aggregate outcome of one fan-out call across all registered subscribers
///
/// `success == false` means at least one subscriber's enqueue attempt
/// failed (FailFast full queue, Block timeout, or a stopped subscriber).
/// Items discarded by DropNewest/DropOldest are counted in that
/// subscriber's dropped counter but do not clear `success`.
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// No subscriber's attempt failed
    pub success: bool,
    /// Payload bytes actually enqueued, summed across subscribers
    pub bytes_written: u64,
    /// Names and reasons for failed attempts, if any
    pub error: Option<String>,
}

/// Point-in-time channel statistics
#[derive(Debug, Clone)]
pub struct ChannelStats {
    /// Number of registered subscribers
    pub subscriber_count: usize,
    /// Utterances started (`notify_start` calls)
    pub utterances_started: u64,
    /// Chunks published
    pub chunks_published: u64,
    /// Payload bytes enqueued across all subscribers
    pub bytes_published: u64,
    /// Per-subscriber snapshots
    pub subscribers: Vec<SubscriberStatsSnapshot>,
}

#[derive(Debug, Default)]
struct ChannelCounters {
    utterances_started: AtomicU64,
    chunks_published: AtomicU64,
    bytes_published: AtomicU64,
}

/// Single-producer, multi-subscriber broadcast channel for one audio stream
pub struct AudioChannel {
    name: String,
    config: ChannelConfig,
    subscribers: RwLock<HashMap<String, Arc<SubscriberEntry>>>,
    closed: AtomicBool,
    counters: ChannelCounters,
}

impl AudioChannel {
    /// Create a channel with default configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ChannelConfig::default())
    }

    /// Create a channel with custom configuration
    pub fn with_config(name: impl Into<String>, config: ChannelConfig) -> Self {
        Self {
            name: name.into(),
            config,
            subscribers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            counters: ChannelCounters::default(),
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether teardown has begun
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Register a subscriber and start its delivery worker
    ///
    /// Fails if the name is taken, the config is invalid, or the channel is
    /// closed.
    pub async fn subscribe(
        &self,
        name: impl Into<String>,
        sink: Arc<dyn AudioSink>,
        config: SubscriberConfig,
    ) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Shutdown);
        }
        config.validate()?;

        let name = name.into();
        let mut subscribers = self.subscribers.write().await;
        if subscribers.contains_key(&name) {
            return Err(ChannelError::DuplicateSubscriber(name));
        }

        let entry = SubscriberEntry::new(name.clone(), sink, config.clone());
        entry.spawn_worker();
        subscribers.insert(name.clone(), entry);

        tracing::info!(
            channel = %self.name,
            subscriber = %name,
            queue_size = config.queue_size,
            strategy = %config.strategy,
            subscribers = subscribers.len(),
            "Subscriber registered"
        );
        Ok(())
    }

    /// Remove a subscriber, cancel its worker, and discard its queued items
    ///
    /// Idempotent: an unknown name is a logged no-op returning `false`.
    pub async fn unsubscribe(&self, name: &str) -> bool {
        let removed = self.subscribers.write().await.remove(name);
        match removed {
            Some(entry) => {
                entry.stop();
                tracing::info!(
                    channel = %self.name,
                    subscriber = %name,
                    "Subscriber removed"
                );
                true
            }
            None => {
                tracing::debug!(
                    channel = %self.name,
                    subscriber = %name,
                    "Unsubscribe for unknown subscriber ignored"
                );
                false
            }
        }
    }

    /// Announce a new utterance to every subscriber
    ///
    /// Must be called once per utterance, before any `publish` for it. The
    /// start-marker travels through the same backpressure path as chunks.
    pub async fn notify_start(
        &self,
        metadata: Arc<AudioMetadata>,
    ) -> Result<PublishResult, ChannelError> {
        let result = self.fan_out(DeliveryItem::Start(metadata)).await?;
        self.counters
            .utterances_started
            .fetch_add(1, Ordering::Relaxed);
        Ok(result)
    }

    /// Broadcast one chunk to every subscriber
    ///
    /// Each subscriber's backpressure policy is applied independently; a
    /// slow or full subscriber never delays another subscriber's enqueue.
    /// Returns `Err` only if the channel is shut down.
    pub async fn publish(&self, chunk: AudioChunk) -> Result<PublishResult, ChannelError> {
        let result = self.fan_out(DeliveryItem::Chunk(chunk)).await?;
        self.counters.chunks_published.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_published
            .fetch_add(result.bytes_written, Ordering::Relaxed);
        Ok(result)
    }

    /// Signal utterance completion to every subscriber
    pub async fn notify_end(
        &self,
        metadata: Arc<AudioMetadata>,
    ) -> Result<PublishResult, ChannelError> {
        self.fan_out(DeliveryItem::End(metadata)).await
    }

    /// Fan one item out to the current subscriber set
    ///
    /// Enqueue attempts resolve concurrently, so a Block-policy subscriber
    /// waiting for space delays only its own attempt; the call returns once
    /// every attempt has resolved.
    async fn fan_out(&self, item: DeliveryItem) -> Result<PublishResult, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Shutdown);
        }

        let entries: Vec<Arc<SubscriberEntry>> = {
            let subscribers = self.subscribers.read().await;
            subscribers.values().cloned().collect()
        };

        let payload_len = item.payload_len() as u64;
        let attempts = entries.iter().map(|entry| {
            let entry = Arc::clone(entry);
            let item = item.clone();
            async move {
                let outcome = entry.enqueue(item).await;
                (entry, outcome)
            }
        });

        let mut bytes_written = 0u64;
        let mut failures: Vec<String> = Vec::new();
        for (entry, outcome) in join_all(attempts).await {
            match outcome {
                EnqueueOutcome::Enqueued => bytes_written += payload_len,
                EnqueueOutcome::Dropped => {}
                EnqueueOutcome::Failed(reason) => {
                    failures.push(format!("{}: {}", entry.name(), reason));
                }
            }
        }

        if failures.is_empty() {
            Ok(PublishResult {
                success: true,
                bytes_written,
                error: None,
            })
        } else {
            Ok(PublishResult {
                success: false,
                bytes_written,
                error: Some(failures.join("; ")),
            })
        }
    }

    /// Number of registered subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Statistics snapshot for one subscriber
    pub async fn subscriber_stats(&self, name: &str) -> Option<SubscriberStatsSnapshot> {
        let subscribers = self.subscribers.read().await;
        subscribers.get(name).map(|entry| entry.snapshot())
    }

    /// Channel statistics snapshot
    pub async fn stats(&self) -> ChannelStats {
        let subscribers = self.subscribers.read().await;
        ChannelStats {
            subscriber_count: subscribers.len(),
            utterances_started: self.counters.utterances_started.load(Ordering::Relaxed),
            chunks_published: self.counters.chunks_published.load(Ordering::Relaxed),
            bytes_published: self.counters.bytes_published.load(Ordering::Relaxed),
            subscribers: subscribers.values().map(|entry| entry.snapshot()).collect(),
        }
    }

    /// Tear the channel down
    ///
    /// Subsequent producer calls and subscribes get `ChannelError::Shutdown`.
    /// Workers are signalled to drain and given the configured grace period;
    /// stragglers are aborted and their remaining items discarded. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let entries: Vec<Arc<SubscriberEntry>> = {
            let mut subscribers = self.subscribers.write().await;
            subscribers.drain().map(|(_, entry)| entry).collect()
        };

        for entry in &entries {
            entry.signal_drain();
        }

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        for entry in &entries {
            if let Some(mut handle) = entry.take_worker() {
                if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                    tracing::warn!(
                        channel = %self.name,
                        subscriber = %entry.name(),
                        "Worker did not drain within grace period, aborting"
                    );
                    handle.abort();
                }
            }
            entry.finalize();
        }

        tracing::info!(
            channel = %self.name,
            subscribers = entries.len(),
            "Channel closed"
        );
    }
}
