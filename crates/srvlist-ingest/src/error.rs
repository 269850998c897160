//! Error types for master-list ingestion.

use thiserror::Error;

/// Boxed error from the underlying byte stream.
pub type StreamError = Box<dyn std::error::Error + Send + Sync>;

/// Terminal framing faults. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("stream error: {0}")]
    Stream(#[source] StreamError),

    #[error("stream ended inside a frame ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    Oversized { len: usize, max: usize },
}

/// A single frame that could not be decoded. The record is skipped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid protobuf payload: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

/// Faults that end an ingestion run before anything is synced.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("master list returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error(transparent)]
    Frame(#[from] FrameError),
}
