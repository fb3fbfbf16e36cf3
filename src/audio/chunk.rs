//! Audio chunk and metadata types
//!
//! An utterance is one synthesized speech unit: a metadata record created
//! once, followed by a stream of PCM chunks. Neither type is mutated after
//! creation, so they are safe to share by reference across any number of
//! subscribers.

use std::time::Duration;

use bytes::Bytes;

/// PCM sample format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian
    #[default]
    S16Le,
    /// 32-bit float little-endian
    F32Le,
}

impl SampleFormat {
    /// Size of one sample in bytes
    pub fn sample_bytes(&self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::F32Le => 4,
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleFormat::S16Le => write!(f, "s16le"),
            SampleFormat::F32Le => write!(f, "f32le"),
        }
    }
}

/// Per-utterance metadata
///
/// Created once per utterance by the synthesis stage and delivered to every
/// subscriber via `on_start` and `on_end`.
#[derive(Debug, Clone)]
pub struct AudioMetadata {
    /// Source text the audio was synthesized from
    pub text: String,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// PCM sample format
    pub format: SampleFormat,
    /// Estimated duration of the full utterance, if the synthesizer knows it
    pub duration_estimate: Option<Duration>,
}

impl AudioMetadata {
    /// Create metadata with the given text and stream parameters
    pub fn new(text: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            text: text.into(),
            sample_rate,
            channels,
            format: SampleFormat::default(),
            duration_estimate: None,
        }
    }

    /// Set the sample format
    pub fn format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the estimated duration
    pub fn duration_estimate(mut self, estimate: Duration) -> Self {
        self.duration_estimate = Some(estimate);
        self
    }
}

/// A bounded slice of raw PCM audio belonging to one utterance
///
/// Cheap to clone: the payload is reference-counted, so all subscribers
/// share the same allocation.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw PCM payload (interleaved samples)
    pub data: Bytes,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Offset of this chunk from the start of the utterance, in milliseconds
    pub timestamp_ms: u64,
    /// Whether this is the last chunk of the utterance
    pub is_final: bool,
}

impl AudioChunk {
    /// Create a chunk
    pub fn new(data: Bytes, sample_rate: u32, channels: u16, timestamp_ms: u64) -> Self {
        Self {
            data,
            sample_rate,
            channels,
            timestamp_ms,
            is_final: false,
        }
    }

    /// Create the final chunk of an utterance
    pub fn final_chunk(data: Bytes, sample_rate: u32, channels: u16, timestamp_ms: u64) -> Self {
        Self {
            data,
            sample_rate,
            channels,
            timestamp_ms,
            is_final: true,
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Playback duration of this chunk in milliseconds, assuming 16-bit samples
    pub fn duration_ms(&self) -> u64 {
        let frame_bytes = 2 * self.channels as u64;
        if self.sample_rate == 0 || frame_bytes == 0 {
            return 0;
        }
        let frames = self.data.len() as u64 / frame_bytes;
        frames * 1000 / self.sample_rate as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let meta = AudioMetadata::new("hello world", 24_000, 1)
            .format(SampleFormat::F32Le)
            .duration_estimate(Duration::from_millis(850));

        assert_eq!(meta.text, "hello world");
        assert_eq!(meta.sample_rate, 24_000);
        assert_eq!(meta.channels, 1);
        assert_eq!(meta.format, SampleFormat::F32Le);
        assert_eq!(meta.duration_estimate, Some(Duration::from_millis(850)));
    }

    #[test]
    fn test_metadata_defaults() {
        let meta = AudioMetadata::new("hi", 16_000, 2);
        assert_eq!(meta.format, SampleFormat::S16Le);
        assert!(meta.duration_estimate.is_none());
    }

    #[test]
    fn test_chunk_duration() {
        // 24kHz mono s16le: 48000 bytes per second
        let chunk = AudioChunk::new(Bytes::from(vec![0u8; 4800]), 24_000, 1, 0);
        assert_eq!(chunk.duration_ms(), 100);
        assert_eq!(chunk.len(), 4800);
        assert!(!chunk.is_final);
    }

    #[test]
    fn test_final_chunk() {
        let chunk = AudioChunk::final_chunk(Bytes::from_static(&[0, 0]), 24_000, 1, 500);
        assert!(chunk.is_final);
        assert_eq!(chunk.timestamp_ms, 500);
    }

    #[test]
    fn test_chunk_clone_shares_payload() {
        let chunk = AudioChunk::new(Bytes::from(vec![1u8; 1024]), 48_000, 2, 0);
        let cloned = chunk.clone();
        // Bytes clones are refcounted views of the same allocation
        assert_eq!(chunk.data.as_ptr(), cloned.data.as_ptr());
    }

    #[test]
    fn test_empty_chunk() {
        let chunk = AudioChunk::new(Bytes::new(), 24_000, 1, 0);
        assert!(chunk.is_empty());
        assert_eq!(chunk.duration_ms(), 0);
    }
}
