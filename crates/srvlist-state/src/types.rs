//! Domain types for the srvlist state store.
//!
//! `ServerView` is the canonical, post-transform record of one server;
//! `HistorySample` is one player-count observation. Both are stored as
//! JSON in redb tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Endpoint identifier ("join id") of a server. Stable across runs.
pub type ServerId = String;

/// Locale used when a server advertises none or an unparseable one.
pub const DEFAULT_LOCALE: &str = "root-AQ";
/// Country paired with [`DEFAULT_LOCALE`].
pub const DEFAULT_LOCALE_COUNTRY: &str = "AQ";

// ── Server ────────────────────────────────────────────────────────

/// Canonical view of one server as of the latest ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerView {
    pub id: ServerId,
    pub join_id: String,
    pub hostname: String,
    /// Canonical BCP-47 tag, e.g. `en-US`.
    pub locale: String,
    /// Two-letter uppercase country derived from `locale`.
    pub locale_country: String,
    pub project_name: String,
    pub project_description: String,
    pub gametype: String,
    pub mapname: String,
    pub gamename: String,
    /// Server software build string.
    pub server: String,
    pub enforce_game_build: String,
    pub banner_connecting: String,
    pub banner_detail: String,
    pub pure_level: Option<String>,
    pub premium: Option<String>,
    pub tags: Vec<String>,
    pub players_current: u32,
    pub players_max: u32,
    pub upvote_power: u32,
    pub burst_power: u32,
    pub private: bool,
    pub script_hook_allowed: bool,
    pub onesync_enabled: bool,
    pub can_review: bool,
    pub icon_version: Option<u32>,
    /// Variables with no dedicated field, kept verbatim.
    pub variables: BTreeMap<String, String>,
}

impl ServerView {
    /// An empty view for `id` carrying the default locale pair.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            join_id: id.to_string(),
            hostname: String::new(),
            locale: DEFAULT_LOCALE.to_string(),
            locale_country: DEFAULT_LOCALE_COUNTRY.to_string(),
            project_name: String::new(),
            project_description: String::new(),
            gametype: String::new(),
            mapname: String::new(),
            gamename: String::new(),
            server: String::new(),
            enforce_game_build: String::new(),
            banner_connecting: String::new(),
            banner_detail: String::new(),
            pure_level: None,
            premium: None,
            tags: Vec::new(),
            players_current: 0,
            players_max: 0,
            upvote_power: 0,
            burst_power: 0,
            private: false,
            script_hook_allowed: false,
            onesync_enabled: false,
            can_review: false,
            icon_version: None,
            variables: BTreeMap::new(),
        }
    }
}

// ── History ───────────────────────────────────────────────────────

/// Player count of one server at one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistorySample {
    pub server_id: ServerId,
    pub clients: u32,
    /// Unix timestamp (seconds) of the run that observed it.
    pub timestamp: u64,
}

impl HistorySample {
    /// Build the history table key under sequence number `seq`.
    ///
    /// The zero-padded timestamp prefix makes key order time order; the
    /// store-assigned sequence keeps samples of different runs apart even
    /// when their timestamps are equal.
    pub fn table_key(&self, seq: u64) -> String {
        history_key(self.timestamp, seq, &self.server_id)
    }
}

/// Key of a history sample; see [`HistorySample::table_key`].
pub fn history_key(timestamp: u64, seq: u64, server_id: &str) -> String {
    format!("{timestamp:020}:{seq:020}:{server_id}")
}

/// Smallest history key with a timestamp of at least `timestamp`.
pub fn history_key_floor(timestamp: u64) -> String {
    format!("{timestamp:020}:")
}

/// Server id part of a history key.
pub fn history_key_server(key: &str) -> Option<&str> {
    key.splitn(3, ':').nth(2)
}

// ── Queries ───────────────────────────────────────────────────────

/// Filter and paging for [`crate::StateStore::query_servers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerQuery {
    /// Match `locale_country` exactly.
    pub locale_country: Option<String>,
    /// Case-insensitive substring over project name and description.
    pub search: Option<String>,
    /// Zero-based offset into the ordered result.
    pub offset: usize,
    pub limit: usize,
}

impl Default for ServerQuery {
    fn default() -> Self {
        Self {
            locale_country: None,
            search: None,
            offset: 0,
            limit: 50,
        }
    }
}

/// One page of servers plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPage {
    pub servers: Vec<ServerView>,
    pub total: usize,
}
