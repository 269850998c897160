//! srvlist-api — HTTP surface of srvlist.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET, POST | `/api/v1/sync` | Trigger an ingestion run (bearer token) |
//! | GET | `/api/v1/sync/status` | Last finished run |
//! | GET | `/api/v1/servers` | Paged server list with rank and icon |
//! | GET | `/api/v1/servers/{id}/history` | Player-count history, newest first |
//! | GET | `/api/v1/locales` | Distinct locale countries |
//! | GET | `/api/icon/{file}` | Cached icon file |

pub mod handlers;
pub mod sync_handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use srvlist_core::TriggerMode;
use srvlist_icons::IconCache;
use srvlist_state::StateStore;
use srvlist_sync::Runner;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub icons: Arc<IconCache>,
    pub runner: Runner,
    /// Bearer token for the trigger. `None` rejects every trigger.
    pub cron_secret: Option<String>,
    pub trigger_mode: TriggerMode,
}

/// Build the complete router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route(
            "/sync",
            get(sync_handlers::trigger_sync).post(sync_handlers::trigger_sync),
        )
        .route("/sync/status", get(sync_handlers::sync_status))
        .route("/servers", get(handlers::list_servers))
        .route("/servers/{id}/history", get(handlers::server_history))
        .route("/locales", get(handlers::list_locales));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/api/icon/{file}", get(handlers::icon_file))
        .with_state(state)
}
