//! Subscriber callback interface
//!
//! A subscriber implements [`AudioSink`] and registers it on a channel. The
//! three async callbacks are invoked strictly sequentially by that
//! subscriber's own delivery worker, so sink-side state needs no locking
//! against concurrent deliveries. A callback that returns `Err` is caught,
//! logged, and counted by the worker; it never reaches the producer or any
//! other subscriber.

use async_trait::async_trait;

use crate::audio::{AudioChunk, AudioMetadata};

/// Result of one callback invocation
pub type SinkResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Consumer callback set for one subscriber
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Called once per utterance, before any chunk of that utterance
    async fn on_start(&self, metadata: &AudioMetadata) -> SinkResult;

    /// Called once per delivered chunk, in enqueue order
    async fn on_chunk(&self, chunk: &AudioChunk) -> SinkResult;

    /// Called once per utterance, after the last chunk this subscriber received
    async fn on_end(&self, metadata: &AudioMetadata) -> SinkResult;

    /// Called from the publish path when an item is dropped or an enqueue
    /// attempt fails for this subscriber, if enabled in its config.
    ///
    /// Unlike the delivery callbacks this may run concurrently with them,
    /// and it runs on the producer's call path: implementations must be
    /// cheap and must not block. `dropped_total` is the subscriber's
    /// cumulative dropped-item count.
    fn on_overflow(&self, dropped_total: u64) {
        let _ = dropped_total;
    }
}
