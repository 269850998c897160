//! StateStore — redb-backed state persistence for srvlist.
//!
//! Provides the batch operations the sync pipeline consumes (existence
//! check, insert-ignoring-duplicates, update-by-id, history append,
//! predicate deletes) plus the read queries behind the HTTP API. Every
//! method is one redb transaction, so each call is atomic on its own.
//! The store supports both on-disk and in-memory backends (the latter
//! for testing).

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableMultimapTable, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SERVERS).map_err(map_err!(Table))?;
        txn.open_table(HISTORY).map_err(map_err!(Table))?;
        txn.open_multimap_table(HISTORY_BY_SERVER)
            .map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Servers ────────────────────────────────────────────────────

    /// Insert or replace a server view.
    pub fn put_server(&self, view: &ServerView) -> StateResult<()> {
        let value = serde_json::to_vec(view).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SERVERS).map_err(map_err!(Table))?;
            table
                .insert(view.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a server by id.
    pub fn get_server(&self, id: &str) -> StateResult<Option<ServerView>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVERS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let view: ServerView =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(view))
            }
            None => Ok(None),
        }
    }

    /// List all servers in id order.
    pub fn list_servers(&self) -> StateResult<Vec<ServerView>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let view: ServerView =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(view);
        }
        Ok(results)
    }

    /// Which of `ids` are already stored.
    pub fn existing_ids(&self, ids: &[ServerId]) -> StateResult<HashSet<ServerId>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVERS).map_err(map_err!(Table))?;
        let mut found = HashSet::new();
        for id in ids {
            if table.get(id.as_str()).map_err(map_err!(Read))?.is_some() {
                found.insert(id.clone());
            }
        }
        Ok(found)
    }

    /// Insert new servers, skipping ids that already exist.
    ///
    /// Returns the number of rows actually inserted.
    pub fn insert_servers(&self, views: &[ServerView]) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut inserted = 0;
        {
            let mut table = txn.open_table(SERVERS).map_err(map_err!(Table))?;
            for view in views {
                if table.get(view.id.as_str()).map_err(map_err!(Read))?.is_some() {
                    continue;
                }
                let value = serde_json::to_vec(view).map_err(map_err!(Serialize))?;
                table
                    .insert(view.id.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                inserted += 1;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(requested = views.len(), inserted, "servers inserted");
        Ok(inserted)
    }

    /// Replace an existing server. Fails with `NotFound` if the id is unknown.
    pub fn update_server(&self, view: &ServerView) -> StateResult<()> {
        let value = serde_json::to_vec(view).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SERVERS).map_err(map_err!(Table))?;
            if table.get(view.id.as_str()).map_err(map_err!(Read))?.is_none() {
                return Err(StateError::NotFound(view.id.clone()));
            }
            table
                .insert(view.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Delete servers by id together with their history.
    ///
    /// Returns the number of servers that existed.
    pub fn delete_servers(&self, ids: &[ServerId]) -> StateResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut deleted = 0;
        let mut history_deleted = 0;
        {
            let mut servers = txn.open_table(SERVERS).map_err(map_err!(Table))?;
            let mut history = txn.open_table(HISTORY).map_err(map_err!(Table))?;
            let mut index = txn
                .open_multimap_table(HISTORY_BY_SERVER)
                .map_err(map_err!(Table))?;
            for id in &doomed {
                if servers.remove(*id).map_err(map_err!(Write))?.is_some() {
                    deleted += 1;
                }
                let keys: Vec<String> = {
                    let mut keys = Vec::new();
                    for key in index.remove_all(*id).map_err(map_err!(Write))? {
                        keys.push(key.map_err(map_err!(Read))?.value().to_string());
                    }
                    keys
                };
                for key in &keys {
                    history.remove(key.as_str()).map_err(map_err!(Write))?;
                }
                history_deleted += keys.len();
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(deleted, history_deleted, "servers deleted");
        Ok(deleted)
    }

    /// One page of servers with players online, most populated first.
    pub fn query_servers(&self, query: &ServerQuery) -> StateResult<ServerPage> {
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matches: Vec<ServerView> = self
            .list_servers()?
            .into_iter()
            .filter(|s| s.players_current > 0)
            .filter(|s| {
                query
                    .locale_country
                    .as_deref()
                    .is_none_or(|country| s.locale_country == country)
            })
            .filter(|s| {
                needle.as_deref().is_none_or(|n| {
                    s.project_name.to_lowercase().contains(n)
                        || s.project_description.to_lowercase().contains(n)
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.players_current
                .cmp(&a.players_current)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matches.len();
        let servers = matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();
        Ok(ServerPage { servers, total })
    }

    /// Distinct locale countries across all servers, sorted.
    pub fn locale_countries(&self) -> StateResult<Vec<String>> {
        let mut countries: Vec<String> = self
            .list_servers()?
            .into_iter()
            .map(|s| s.locale_country)
            .collect();
        countries.sort();
        countries.dedup();
        Ok(countries)
    }

    // ── History ────────────────────────────────────────────────────

    /// Append history samples. Every sample gets a fresh sequence number,
    /// so nothing already stored is ever overwritten or skipped.
    ///
    /// Returns the number of samples inserted.
    pub fn insert_history(&self, samples: &[HistorySample]) -> StateResult<usize> {
        if samples.is_empty() {
            return Ok(0);
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let mut seq = meta
                .get(HISTORY_SEQ)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0);
            let mut table = txn.open_table(HISTORY).map_err(map_err!(Table))?;
            let mut index = txn
                .open_multimap_table(HISTORY_BY_SERVER)
                .map_err(map_err!(Table))?;
            for sample in samples {
                seq += 1;
                let key = sample.table_key(seq);
                let value = serde_json::to_vec(sample).map_err(map_err!(Serialize))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                index
                    .insert(sample.server_id.as_str(), key.as_str())
                    .map_err(map_err!(Write))?;
            }
            meta.insert(HISTORY_SEQ, seq).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(samples.len())
    }

    /// All samples of one server, newest first.
    pub fn history_for_server(&self, server_id: &str) -> StateResult<Vec<HistorySample>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let index = txn
            .open_multimap_table(HISTORY_BY_SERVER)
            .map_err(map_err!(Table))?;
        let table = txn.open_table(HISTORY).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        // Index values come back in key order, which is time order.
        for key in index.get(server_id).map_err(map_err!(Read))? {
            let key = key.map_err(map_err!(Read))?;
            if let Some(value) = table.get(key.value()).map_err(map_err!(Read))? {
                let sample: HistorySample =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(sample);
            }
        }
        results.reverse();
        Ok(results)
    }

    /// Delete every sample with `timestamp < cutoff`. Returns number deleted.
    pub fn delete_history_before(&self, cutoff: u64) -> StateResult<usize> {
        let floor = history_key_floor(cutoff);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count;
        {
            let mut table = txn.open_table(HISTORY).map_err(map_err!(Table))?;
            let mut index = txn
                .open_multimap_table(HISTORY_BY_SERVER)
                .map_err(map_err!(Table))?;
            let keys: Vec<String> = {
                let mut keys = Vec::new();
                for entry in table.range(..floor.as_str()).map_err(map_err!(Read))? {
                    let (key, _) = entry.map_err(map_err!(Read))?;
                    keys.push(key.value().to_string());
                }
                keys
            };
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
                if let Some(server_id) = history_key_server(key) {
                    index
                        .remove(server_id, key.as_str())
                        .map_err(map_err!(Write))?;
                }
            }
            count = keys.len();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(cutoff, count, "history deleted");
        Ok(count)
    }

    /// Ids of servers with no history sample at or after `cutoff`.
    pub fn servers_without_history_since(&self, cutoff: u64) -> StateResult<Vec<ServerId>> {
        let floor = history_key_floor(cutoff);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;

        let mut active: HashSet<String> = HashSet::new();
        {
            let history = txn.open_table(HISTORY).map_err(map_err!(Table))?;
            for entry in history.range(floor.as_str()..).map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                if let Some(server_id) = history_key_server(key.value()) {
                    active.insert(server_id.to_string());
                }
            }
        }

        let servers = txn.open_table(SERVERS).map_err(map_err!(Table))?;
        let mut stale = Vec::new();
        for entry in servers.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            let id = key.value();
            if !active.contains(id) {
                stale.push(id.to_string());
            }
        }
        Ok(stale)
    }
}
