//! Stream → in-memory snapshot of transformed servers.

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::Stream;
use tracing::{debug, info};

use srvlist_core::{GameName, IngestConfig};
use srvlist_state::ServerView;

use crate::decode::decode;
use crate::error::FrameError;
use crate::frame::{FrameReader, LengthPrefixed};
use crate::transform::transform;

/// What to keep from the stream.
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub game: GameName,
    /// Keep only servers whose canonical locale equals this tag.
    pub locale_filter: Option<String>,
    pub max_frame_bytes: usize,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            game: GameName::default(),
            locale_filter: None,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

impl From<&IngestConfig> for SnapshotOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            game: config.game,
            locale_filter: config.locale_filter.clone(),
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

/// Per-run ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SnapshotStats {
    pub frames: usize,
    pub bytes: usize,
    pub accepted: usize,
    /// Frames that were not valid protobuf.
    pub malformed: usize,
    /// Entries without an endpoint id or data section.
    pub incomplete: usize,
    pub other_game: usize,
    pub other_locale: usize,
}

/// Transformed servers of one run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub servers: Vec<ServerView>,
    pub stats: SnapshotStats,
}

/// Read the whole stream and keep the servers that pass the filters.
///
/// A bad record is counted and skipped; a bad stream fails the call and
/// nothing collected so far is returned.
pub async fn collect_snapshot<St, B, E>(
    stream: St,
    options: &SnapshotOptions,
) -> Result<Snapshot, FrameError>
where
    St: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let started = Instant::now();
    let mut snapshot = Snapshot::default();
    let mut decode_time = Duration::ZERO;
    let mut transform_time = Duration::ZERO;

    let reader = FrameReader::new(LengthPrefixed::new(options.max_frame_bytes));
    let frame_stats = reader
        .read(stream, |frame: Bytes| {
            let t = Instant::now();
            let decoded = decode(&frame);
            decode_time += t.elapsed();

            let record = match decoded {
                Ok(Some(record)) => record,
                Ok(None) => {
                    snapshot.stats.incomplete += 1;
                    return;
                }
                Err(e) => {
                    debug!(error = %e, len = frame.len(), "skipping malformed frame");
                    snapshot.stats.malformed += 1;
                    return;
                }
            };

            if !options.game.matches(record.gamename()) {
                snapshot.stats.other_game += 1;
                return;
            }

            let t = Instant::now();
            let view = transform(&record);
            transform_time += t.elapsed();

            if let Some(filter) = &options.locale_filter {
                if &view.locale != filter {
                    snapshot.stats.other_locale += 1;
                    return;
                }
            }

            snapshot.stats.accepted += 1;
            snapshot.servers.push(view);
        })
        .await?;

    snapshot.stats.frames = frame_stats.frames;
    snapshot.stats.bytes = frame_stats.bytes;

    info!(
        game = %options.game,
        frames = snapshot.stats.frames,
        accepted = snapshot.stats.accepted,
        malformed = snapshot.stats.malformed,
        other_game = snapshot.stats.other_game,
        decode_ms = decode_time.as_millis() as u64,
        transform_ms = transform_time.as_millis() as u64,
        total_ms = started.elapsed().as_millis() as u64,
        "master list snapshot collected"
    );
    Ok(snapshot)
}
