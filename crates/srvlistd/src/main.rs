//! srvlistd — the srvlist daemon.
//!
//! Single binary that assembles all srvlist subsystems:
//! - State store (redb)
//! - Ingestion pipeline behind a single-worker run queue
//! - Optional run scheduler
//! - Icon cache
//! - HTTP API (sync trigger, server listings, icon files)
//!
//! # Usage
//!
//! ```text
//! srvlistd serve --config srvlist.toml --port 8080 --data-dir /var/lib/srvlist
//! srvlistd run-once --config srvlist.toml
//! ```

mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use srvlist_core::SrvlistConfig;
use srvlist_state::StateStore;
use srvlist_sync::Pipeline;

/// Config file picked up from the working directory when `--config` is
/// not given.
const DEFAULT_CONFIG_FILE: &str = "srvlist.toml";

#[derive(Parser)]
#[command(name = "srvlistd", about = "srvlist daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API and run ingestion on trigger or schedule.
    Serve {
        #[command(flatten)]
        common: CommonArgs,

        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Bearer secret for the sync trigger.
        #[arg(long, env = "SRVLIST_CRON_SECRET", hide_env_values = true)]
        cron_secret: Option<String>,

        /// Seconds between scheduled runs; 0 disables the schedule.
        #[arg(long)]
        schedule_interval: Option<u64>,
    },

    /// Run one ingestion pass and print its report.
    RunOnce {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(clap::Args)]
struct CommonArgs {
    /// Path to srvlist.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for the database and icon cache.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            common,
            port,
            cron_secret,
            schedule_interval,
        } => {
            let mut config = load_config(common.config.as_deref())?;
            if let Some(data_dir) = common.data_dir {
                config.server.data_dir = data_dir;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if cron_secret.is_some() {
                config.server.cron_secret = cron_secret;
            }
            if let Some(interval) = schedule_interval {
                config.server.schedule_interval_secs = interval;
            }
            serve::run_serve(config).await
        }
        Command::RunOnce { common } => {
            let mut config = load_config(common.config.as_deref())?;
            if let Some(data_dir) = common.data_dir {
                config.server.data_dir = data_dir;
            }
            run_once(config).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,srvlistd=debug,srvlist=debug"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Explicit path, else `srvlist.toml` in the working directory, else
/// defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<SrvlistConfig> {
    match path {
        Some(path) => SrvlistConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            SrvlistConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))
        }
        None => Ok(SrvlistConfig::default()),
    }
}

/// Open the store under the configured data directory.
pub(crate) fn open_store(config: &SrvlistConfig) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "failed to create data dir {}",
            config.server.data_dir.display()
        )
    })?;
    let db_path = config.db_path();
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(store)
}

async fn run_once(config: SrvlistConfig) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let pipeline = Pipeline::new(&config, Arc::new(store))?;
    let report = pipeline.run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
