//! # audiocast
//!
//! Real-time PCM audio broadcast channel with per-subscriber backpressure.
//!
//! A speech synthesizer (or any single producer of raw PCM) publishes
//! utterances into an [`AudioChannel`]; any number of consumers — an avatar
//! lip-sync driver, a local player, a remote encoder — register an
//! [`AudioSink`] and receive the stream through their own bounded queue,
//! each with its own [`BackpressureStrategy`] and error isolation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use audiocast::{
//!     AudioChannel, AudioChunk, AudioMetadata, AudioSink, SinkResult, SubscriberConfig,
//! };
//! use bytes::Bytes;
//!
//! struct Player;
//!
//! #[async_trait]
//! impl AudioSink for Player {
//!     async fn on_start(&self, metadata: &AudioMetadata) -> SinkResult {
//!         println!("speaking: {}", metadata.text);
//!         Ok(())
//!     }
//!     async fn on_chunk(&self, chunk: &AudioChunk) -> SinkResult {
//!         // feed chunk.data to the audio device
//!         Ok(())
//!     }
//!     async fn on_end(&self, _metadata: &AudioMetadata) -> SinkResult {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = AudioChannel::new("speech");
//! channel
//!     .subscribe("player", Arc::new(Player), SubscriberConfig::default())
//!     .await?;
//!
//! let metadata = Arc::new(AudioMetadata::new("hello world", 24_000, 1));
//! channel.notify_start(metadata.clone()).await?;
//! channel
//!     .publish(AudioChunk::new(Bytes::from(vec![0u8; 4800]), 24_000, 1, 0))
//!     .await?;
//! channel.notify_end(metadata).await?;
//!
//! channel.close().await;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod channel;

pub use audio::{AudioChunk, AudioMetadata, SampleFormat};
pub use channel::{
    AudioChannel, AudioSink, BackpressureStrategy, ChannelConfig, ChannelError, ChannelStats,
    PublishResult, SinkResult, SubscriberConfig, SubscriberState, SubscriberStatsSnapshot,
};
