//! srvlist.toml configuration parser.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a working configuration pointed at the public master list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::game::GameName;

pub const DEFAULT_MASTER_LIST_URL: &str =
    "https://servers-frontend.fivem.net/api/servers/streamRedir/";
pub const DEFAULT_ICON_BASE_URL: &str = "https://servers-frontend.fivem.net/api/servers";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SrvlistConfig {
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    pub sync: SyncConfig,
    pub icons: IconsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Bearer secret for the sync trigger. Unset means the trigger
    /// rejects every request.
    pub cron_secret: Option<String>,
    pub trigger_mode: TriggerMode,
    /// Run ingestion on a timer as well as on trigger. 0 disables it.
    pub schedule_interval_secs: u64,
}

/// How the HTTP trigger relates to the run it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Respond as soon as the run is queued.
    #[default]
    Detached,
    /// Respond with the run's report once it finished.
    Wait,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub master_list_url: String,
    pub game: GameName,
    /// Keep only servers whose canonical locale equals this tag (e.g. "de-DE").
    pub locale_filter: Option<String>,
    /// Upper bound for a single length-prefixed frame.
    pub max_frame_bytes: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Keep only the top N servers by current player count.
    pub max_servers: usize,
    pub chunk_size: usize,
    /// Store operations allowed in flight at once.
    pub max_in_flight: usize,
    /// Run the retention sweep after each sync.
    pub sweep_after_sync: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IconsConfig {
    /// Directory for cached icons. Relative paths resolve against `data_dir`.
    pub dir: PathBuf,
    pub base_url: String,
    pub placeholder: String,
    pub fetch_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("/var/lib/srvlist"),
            cron_secret: None,
            trigger_mode: TriggerMode::default(),
            schedule_interval_secs: 0,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            master_list_url: DEFAULT_MASTER_LIST_URL.to_string(),
            game: GameName::default(),
            locale_filter: None,
            max_frame_bytes: 16 * 1024 * 1024,
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_servers: 10_000,
            chunk_size: 5_000,
            max_in_flight: 4,
            sweep_after_sync: true,
        }
    }
}

impl Default for IconsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("icons"),
            base_url: DEFAULT_ICON_BASE_URL.to_string(),
            placeholder: "/images/placeholder.jpeg".to_string(),
            fetch_concurrency: 16,
        }
    }
}

impl SrvlistConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: SrvlistConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values that would stall the pipeline.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sync.chunk_size == 0 {
            anyhow::bail!("sync.chunk_size must be at least 1");
        }
        if self.sync.max_in_flight == 0 {
            anyhow::bail!("sync.max_in_flight must be at least 1");
        }
        if self.icons.fetch_concurrency == 0 {
            anyhow::bail!("icons.fetch_concurrency must be at least 1");
        }
        if self.ingest.max_frame_bytes == 0 {
            anyhow::bail!("ingest.max_frame_bytes must be at least 1");
        }
        Ok(())
    }

    pub fn icon_dir(&self) -> PathBuf {
        if self.icons.dir.is_absolute() {
            self.icons.dir.clone()
        } else {
            self.server.data_dir.join(&self.icons.dir)
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.server.data_dir.join("srvlist.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = SrvlistConfig::from_toml("").unwrap();
        assert_eq!(config, SrvlistConfig::default());
        assert_eq!(config.sync.chunk_size, 5_000);
        assert_eq!(config.ingest.game, GameName::Gta5);
        assert_eq!(config.server.trigger_mode, TriggerMode::Detached);
    }

    #[test]
    fn test_parse_partial() {
        let toml_str = r#"
[server]
port = 9000
cron_secret = "hunter2"
trigger_mode = "wait"

[ingest]
game = "rdr3"
locale_filter = "de-DE"

[sync]
max_in_flight = 2
"#;
        let config = SrvlistConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.cron_secret.as_deref(), Some("hunter2"));
        assert_eq!(config.server.trigger_mode, TriggerMode::Wait);
        assert_eq!(config.ingest.game, GameName::Rdr3);
        assert_eq!(config.ingest.locale_filter.as_deref(), Some("de-DE"));
        assert_eq!(config.sync.max_in_flight, 2);
        // Untouched fields keep defaults.
        assert_eq!(config.sync.chunk_size, 5_000);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = SrvlistConfig::from_toml("[sync]\nchunk_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_icon_dir_relative_to_data_dir() {
        let mut config = SrvlistConfig::default();
        config.server.data_dir = PathBuf::from("/tmp/srv");
        assert_eq!(config.icon_dir(), PathBuf::from("/tmp/srv/icons"));

        config.icons.dir = PathBuf::from("/srv/icons");
        assert_eq!(config.icon_dir(), PathBuf::from("/srv/icons"));
    }

    #[test]
    fn test_round_trip_toml() {
        let config = SrvlistConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("master_list_url"));
        assert_eq!(SrvlistConfig::from_toml(&text).unwrap(), config);
    }
}
