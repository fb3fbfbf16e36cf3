//! Broadcast channel for real-time audio fan-out
//!
//! One producer per channel publishes an utterance (start-marker, PCM
//! chunks, end-marker); every registered subscriber receives it through its
//! own bounded queue and dedicated delivery worker, paced independently of
//! the others.
//!
//! # Architecture
//!
//! ```text
//!                           AudioChannel
//!                  ┌────────────────────────────┐
//!                  │ subscribers: RwLock<       │
//!                  │   HashMap<Name,            │
//!                  │     SubscriberEntry {      │
//!                  │       queue, policy,       │
//!                  │       worker, stats,       │
//!                  │     }                      │
//!                  │   >                        │
//!                  │ >                          │
//!                  └─────────────┬──────────────┘
//!                                │ publish(chunk)
//!          ┌─────────────────────┼─────────────────────┐
//!          │ policy A            │ policy B            │ policy C
//!          ▼                     ▼                     ▼
//!     [queue, worker]       [queue, worker]       [queue, worker]
//!          │                     │                     │
//!          ▼                     ▼                     ▼
//!     sink.on_chunk()       sink.on_chunk()       sink.on_chunk()
//! ```
//!
//! # Isolation guarantees
//!
//! - Strict FIFO per subscriber; no ordering guarantee across subscribers.
//! - A subscriber's backpressure policy (block, drop-newest, drop-oldest,
//!   fail-fast) is applied to its queue alone; a full or slow subscriber
//!   never stalls delivery to the others.
//! - Callback failures are caught and counted by that subscriber's own
//!   worker and never reach the producer.
//!
//! # Zero-Copy Design
//!
//! Chunk payloads are `bytes::Bytes` and utterance metadata travels behind
//! an `Arc`, so fanning an item out to N subscribers clones reference
//! counts, never audio data.

pub mod broadcast;
pub mod config;
pub mod error;
mod item;
pub mod sink;
pub mod subscriber;

pub use broadcast::{AudioChannel, ChannelStats, PublishResult};
pub use config::{BackpressureStrategy, ChannelConfig, SubscriberConfig};
pub use error::ChannelError;
pub use sink::{AudioSink, SinkResult};
pub use subscriber::{SubscriberState, SubscriberStatsSnapshot};
