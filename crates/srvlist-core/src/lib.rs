pub mod config;
pub mod game;

pub use config::{
    IconsConfig, IngestConfig, ServerConfig, SrvlistConfig, SyncConfig, TriggerMode,
};
pub use game::{GameName, UnknownGame};
