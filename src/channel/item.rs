//! Delivery items flowing through subscriber queues
//!
//! Start- and end-markers travel through the same bounded queue as chunks,
//! so a subscriber always observes them in publish order relative to the
//! chunks it actually received.

use std::sync::Arc;

use crate::audio::{AudioChunk, AudioMetadata};

/// One item in a subscriber's delivery queue
///
/// Cheap to clone: chunks carry refcounted payloads and metadata is shared
/// behind an `Arc`, so fan-out to N subscribers copies no audio data.
#[derive(Debug, Clone)]
pub enum DeliveryItem {
    /// Utterance start-marker, delivered via `on_start`
    Start(Arc<AudioMetadata>),
    /// Audio chunk, delivered via `on_chunk`
    Chunk(AudioChunk),
    /// Utterance end-marker, delivered via `on_end`
    End(Arc<AudioMetadata>),
}

impl DeliveryItem {
    /// Item kind label for logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryItem::Start(_) => "start",
            DeliveryItem::Chunk(_) => "chunk",
            DeliveryItem::End(_) => "end",
        }
    }

    /// Payload size in bytes (zero for markers)
    pub fn payload_len(&self) -> usize {
        match self {
            DeliveryItem::Chunk(chunk) => chunk.len(),
            _ => 0,
        }
    }
}
