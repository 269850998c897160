//! Frame reassembly over an arbitrarily chunked byte stream.
//!
//! Network reads do not respect frame boundaries. The reader keeps the
//! unconsumed tail of every chunk, appends the next chunk to it and scans
//! again, so a frame split across any number of reads is emitted exactly
//! once. Frames go to the sink as soon as their last byte arrives.
//!
//! The byte-level grammar is a [`FrameFormat`]. The master list uses
//! [`LengthPrefixed`]: a little-endian `u32` length, then the payload.

use std::pin::pin;

use bytes::{Buf, Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::error::FrameError;

/// Splits complete frames off the front of a buffer.
pub trait FrameFormat {
    /// Remove and return the next complete frame, or `None` if the
    /// buffer does not hold one yet.
    fn next_frame(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, FrameError>;
}

/// `u32` little-endian length prefix followed by the payload.
#[derive(Debug, Clone)]
pub struct LengthPrefixed {
    max_frame_len: usize,
}

const PREFIX_LEN: usize = 4;

impl LengthPrefixed {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    /// Prefix `payload` with its length. Inverse of [`FrameFormat::next_frame`].
    pub fn encode(payload: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
    }
}

impl Default for LengthPrefixed {
    fn default() -> Self {
        Self::new(16 * 1024 * 1024)
    }
}

impl FrameFormat for LengthPrefixed {
    fn next_frame(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        if buf.len() < PREFIX_LEN {
            return Ok(None);
        }
        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > self.max_frame_len {
            return Err(FrameError::Oversized {
                len,
                max: self.max_frame_len,
            });
        }
        let total = PREFIX_LEN + len;
        if buf.len() < total {
            buf.reserve(total - buf.len());
            return Ok(None);
        }
        buf.advance(PREFIX_LEN);
        Ok(Some(buf.split_to(len).freeze()))
    }
}

/// Frames terminated by a delimiter byte. Empty frames are dropped.
#[derive(Debug, Clone)]
pub struct Delimited {
    delimiter: u8,
    /// Bytes at the front of the buffer already known not to contain
    /// the delimiter.
    scanned: usize,
}

impl Delimited {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            scanned: 0,
        }
    }
}

impl FrameFormat for Delimited {
    fn next_frame(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        loop {
            let Some(pos) = buf[self.scanned..]
                .iter()
                .position(|b| *b == self.delimiter)
            else {
                self.scanned = buf.len();
                return Ok(None);
            };
            let end = self.scanned + pos;
            self.scanned = 0;
            let frame = buf.split_to(end).freeze();
            buf.advance(1);
            if !frame.is_empty() {
                return Ok(Some(frame));
            }
        }
    }
}

/// Counters reported once the stream completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub chunks: usize,
    pub frames: usize,
    pub bytes: usize,
}

/// Reassembles frames of format `F` from chunks.
pub struct FrameReader<F> {
    format: F,
    buf: BytesMut,
    stats: FrameStats,
}

impl<F: FrameFormat> FrameReader<F> {
    pub fn new(format: F) -> Self {
        Self {
            format,
            buf: BytesMut::new(),
            stats: FrameStats::default(),
        }
    }

    /// Append one chunk and emit every frame it completes.
    pub fn push<S>(&mut self, chunk: &[u8], sink: &mut S) -> Result<(), FrameError>
    where
        S: FnMut(Bytes),
    {
        self.stats.chunks += 1;
        self.stats.bytes += chunk.len();
        self.buf.extend_from_slice(chunk);
        while let Some(frame) = self.format.next_frame(&mut self.buf)? {
            self.stats.frames += 1;
            sink(frame);
        }
        Ok(())
    }

    /// End of input. Leftover bytes mean the last frame was cut short.
    pub fn finish(self) -> Result<FrameStats, FrameError> {
        if !self.buf.is_empty() {
            return Err(FrameError::Truncated {
                buffered: self.buf.len(),
            });
        }
        Ok(self.stats)
    }

    /// Drain `stream` into `sink`, returning once the stream has ended
    /// and every frame was delivered.
    pub async fn read<St, B, E, S>(mut self, stream: St, mut sink: S) -> Result<FrameStats, FrameError>
    where
        St: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::error::Error + Send + Sync + 'static,
        S: FnMut(Bytes),
    {
        let mut stream = pin!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FrameError::Stream(Box::new(e)))?;
            self.push(chunk.as_ref(), &mut sink)?;
        }
        let stats = self.finish()?;
        debug!(
            chunks = stats.chunks,
            frames = stats.frames,
            bytes = stats.bytes,
            "frame stream complete"
        );
        Ok(stats)
    }
}
