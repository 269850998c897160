//! srvlist-ingest — turns the streamed master list into server views.
//!
//! # Pipeline
//!
//! ```text
//! HTTP body (chunks)
//!   └── FrameReader<LengthPrefixed>   reassembles frames across chunks
//!         └── decode()               protobuf master.Server → RawServerRecord
//!               ├── game filter      `gamename` var, default gta5
//!               └── transform()      RawServerRecord → ServerView
//!                     └── Snapshot   in-memory list for the sync engine
//! ```
//!
//! Framing and decoding are a single sequential consumer: frame boundaries
//! depend on the cumulative buffer, so nothing here is parallelized.
//! A malformed record is skipped; a malformed stream fails the whole run.

pub mod decode;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod locale;
pub mod proto;
pub mod sanitize;
pub mod snapshot;
pub mod transform;

pub use decode::{RawServerData, RawServerRecord, decode};
pub use error::{DecodeError, FrameError, IngestError};
pub use fetch::MasterListClient;
pub use frame::{Delimited, FrameFormat, FrameReader, FrameStats, LengthPrefixed};
pub use snapshot::{Snapshot, SnapshotOptions, SnapshotStats, collect_snapshot};
pub use transform::transform;
