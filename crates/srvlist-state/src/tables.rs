//! redb table definitions for the srvlist state store.

use redb::{MultimapTableDefinition, TableDefinition};

/// Server views keyed by endpoint id.
pub const SERVERS: TableDefinition<&str, &[u8]> = TableDefinition::new("servers");

/// History samples keyed by `{timestamp:020}:{seq:020}:{server_id}`.
pub const HISTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("history");

/// server_id → history keys of that server.
pub const HISTORY_BY_SERVER: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("history_by_server");

/// Store counters.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Last history sequence number handed out.
pub const HISTORY_SEQ: &str = "history_seq";
