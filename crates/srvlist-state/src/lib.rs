//! srvlist-state — embedded state store for srvlist.
//!
//! Backed by [redb](https://docs.rs/redb), persists the canonical server
//! views and their player-count history.
//!
//! # Architecture
//!
//! Values are JSON-serialized into redb's `&[u8]` columns. Servers are
//! keyed by their endpoint id; history samples by
//! `{timestamp:020}:{seq:020}:{server_id}`, so retention deletes and
//! "seen since" scans are ordered range scans. A multimap index from
//! server id to history keys serves per-server reads and cascades.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
