//! Serve mode: HTTP API, run queue and optional scheduler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use srvlist_api::{ApiState, build_router};
use srvlist_core::SrvlistConfig;
use srvlist_icons::IconCache;
use srvlist_sync::{Pipeline, Runner};

pub async fn run_serve(config: SrvlistConfig) -> anyhow::Result<()> {
    info!("srvlist daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let store = crate::open_store(&config)?;

    let icons = Arc::new(IconCache::new(config.icon_dir(), &config.icons)?);
    info!(dir = ?icons.dir(), "icon cache initialized");

    let pipeline = Arc::new(Pipeline::new(&config, Arc::new(store.clone()))?);
    info!(
        url = %config.ingest.master_list_url,
        game = %config.ingest.game,
        "ingestion pipeline initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let runner = Runner::spawn(
        move || {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.run().await }
        },
        shutdown_rx.clone(),
    );

    let schedule_handle = match config.server.schedule_interval_secs {
        0 => None,
        secs => {
            let runner = runner.clone();
            let shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                runner.schedule(Duration::from_secs(secs), shutdown).await;
            }))
        }
    };

    if config.server.cron_secret.is_none() {
        warn!("no cron secret configured, the sync trigger rejects every request");
    }

    // ── Start API server ───────────────────────────────────────

    let router = build_router(ApiState {
        store,
        icons,
        runner,
        cron_secret: config.server.cron_secret.clone(),
        trigger_mode: config.server.trigger_mode,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    if let Some(handle) = schedule_handle {
        let _ = handle.await;
    }

    info!("srvlist daemon stopped");
    Ok(())
}
