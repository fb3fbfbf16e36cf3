//! Audio data model
//!
//! Immutable value types for synthesized-speech audio: per-utterance
//! metadata and the PCM chunks that make up an utterance. Both are cheap to
//! share across subscribers — chunk payloads are reference-counted
//! `bytes::Bytes` and metadata travels behind an `Arc`.

pub mod chunk;

pub use chunk::{AudioChunk, AudioMetadata, SampleFormat};
