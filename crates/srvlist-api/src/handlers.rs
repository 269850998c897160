//! Read API handlers.
//!
//! Each handler reads via `StateStore` and returns JSON responses; icon
//! paths come from the shared `IconCache`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::warn;

use srvlist_state::{ServerQuery, ServerView};

use crate::ApiState;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Servers ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ServerListParams {
    /// Two-letter locale country, e.g. `DE`.
    pub locale: Option<String>,
    /// One-based.
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerListItem {
    pub rank: usize,
    pub icon: String,
    #[serde(flatten)]
    pub server: ServerView,
}

#[derive(Debug, Serialize)]
pub struct ServerListPage {
    pub servers: Vec<ServerListItem>,
    pub total_count: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

/// GET /api/v1/servers
pub async fn list_servers(
    State(state): State<ApiState>,
    Query(params): Query<ServerListParams>,
) -> impl IntoResponse {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let Some(offset) = (page - 1).checked_mul(page_size) else {
        return error_response("page out of range", StatusCode::BAD_REQUEST).into_response();
    };

    let query = ServerQuery {
        locale_country: params
            .locale
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_ascii_uppercase()),
        search: params.search.filter(|s| !s.trim().is_empty()),
        offset,
        limit: page_size,
    };

    let result = match state.store.query_servers(&query) {
        Ok(result) => result,
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    };

    state.icons.preload_icons(&result.servers).await;
    let mut servers = Vec::with_capacity(result.servers.len());
    for (i, server) in result.servers.into_iter().enumerate() {
        let icon = state.icons.resolve(&server.id, server.icon_version).await;
        servers.push(ServerListItem {
            rank: offset.saturating_add(i + 1),
            icon,
            server,
        });
    }

    ApiResponse::ok(ServerListPage {
        servers,
        total_count: result.total,
        current_page: page,
        total_pages: result.total.div_ceil(page_size),
    })
    .into_response()
}

/// GET /api/v1/servers/{id}/history
pub async fn server_history(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_server(&id) {
        Ok(Some(_)) => {}
        Ok(None) => return error_response("server not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => {
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
                .into_response();
        }
    }
    match state.store.history_for_server(&id) {
        Ok(history) => ApiResponse::ok(history).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Locales ────────────────────────────────────────────────────

/// GET /api/v1/locales
pub async fn list_locales(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.locale_countries() {
        Ok(countries) => ApiResponse::ok(countries).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Icons ──────────────────────────────────────────────────────

/// GET /api/icon/{file}
pub async fn icon_file(State(state): State<ApiState>, Path(file): Path<String>) -> impl IntoResponse {
    let Some(path) = state.icons.file_path(&file) else {
        return error_response("invalid icon name", StatusCode::BAD_REQUEST).into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error_response("icon not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read icon");
            error_response("failed to read icon", StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::to_bytes;
    use srvlist_core::{IconsConfig, TriggerMode};
    use srvlist_icons::IconCache;
    use srvlist_state::{HistorySample, StateStore};
    use srvlist_sync::Runner;
    use tokio::sync::watch;

    /// State over an in-memory store, a temp icon dir and a runner whose
    /// runs always fail. The returned guards must outlive the state.
    pub(crate) fn test_state() -> (ApiState, tempfile::TempDir, watch::Sender<bool>) {
        let tmp = tempfile::tempdir().unwrap();
        let config = IconsConfig {
            // Nothing listens here; icon fetches fail fast.
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let icons = Arc::new(IconCache::new(tmp.path().join("icons"), &config).unwrap());
        let (tx, rx) = watch::channel(false);
        let runner = Runner::spawn(|| async { Err(anyhow::anyhow!("no upstream in tests")) }, rx);
        let state = ApiState {
            store: StateStore::open_in_memory().unwrap(),
            icons,
            runner,
            cron_secret: Some("s3cret".to_string()),
            trigger_mode: TriggerMode::Detached,
        };
        (state, tmp, tx)
    }

    pub(crate) async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn server(id: &str, players: u32, country: &str, icon_version: Option<u32>) -> ServerView {
        let mut v = ServerView::placeholder(id);
        v.players_current = players;
        v.project_name = format!("Project {id}");
        v.locale = format!("xx-{country}");
        v.locale_country = country.to_string();
        v.icon_version = icon_version;
        v
    }

    #[tokio::test]
    async fn list_servers_ranks_and_pages() {
        let (state, tmp, _tx) = test_state();
        for (id, players) in [("a1", 5), ("b2", 50), ("c3", 20), ("d4", 0)] {
            state.store.put_server(&server(id, players, "DE", Some(1))).unwrap();
        }
        std::fs::write(tmp.path().join("icons/c3_1.png"), b"png").unwrap();

        let params = ServerListParams {
            page: Some(1),
            page_size: Some(2),
            ..Default::default()
        };
        let resp = list_servers(State(state.clone()), Query(params)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let data = &body["data"];
        assert_eq!(data["total_count"], 3);
        assert_eq!(data["total_pages"], 2);
        assert_eq!(data["servers"][0]["id"], "b2");
        assert_eq!(data["servers"][0]["rank"], 1);
        assert_eq!(data["servers"][0]["icon"], "/images/placeholder.jpeg");
        assert_eq!(data["servers"][1]["id"], "c3");
        assert_eq!(data["servers"][1]["rank"], 2);
        assert_eq!(data["servers"][1]["icon"], "/api/icon/c3_1.png");

        let params = ServerListParams {
            page: Some(2),
            page_size: Some(2),
            ..Default::default()
        };
        let body = body_json(list_servers(State(state), Query(params)).await.into_response()).await;
        assert_eq!(body["data"]["servers"][0]["id"], "a1");
        assert_eq!(body["data"]["servers"][0]["rank"], 3);
    }

    #[tokio::test]
    async fn list_servers_rejects_page_past_addressable_range() {
        let (state, _tmp, _tx) = test_state();
        state.store.put_server(&server("a1", 5, "DE", None)).unwrap();

        let params = ServerListParams {
            page: Some(usize::MAX),
            ..Default::default()
        };
        let resp = list_servers(State(state.clone()), Query(params)).await.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        // Far but representable pages are simply empty.
        let params = ServerListParams {
            page: Some(usize::MAX / MAX_PAGE_SIZE),
            page_size: Some(MAX_PAGE_SIZE),
            ..Default::default()
        };
        let resp = list_servers(State(state), Query(params)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"]["total_count"], 1);
        assert!(body["data"]["servers"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_servers_filters_locale_and_search() {
        let (state, _tmp, _tx) = test_state();
        state.store.put_server(&server("de1", 5, "DE", None)).unwrap();
        state.store.put_server(&server("us1", 9, "US", None)).unwrap();

        let params = ServerListParams {
            locale: Some("de".to_string()),
            ..Default::default()
        };
        let body = body_json(
            list_servers(State(state.clone()), Query(params)).await.into_response(),
        )
        .await;
        assert_eq!(body["data"]["total_count"], 1);
        assert_eq!(body["data"]["servers"][0]["id"], "de1");

        let params = ServerListParams {
            search: Some("PROJECT US".to_string()),
            ..Default::default()
        };
        let body = body_json(list_servers(State(state), Query(params)).await.into_response()).await;
        assert_eq!(body["data"]["total_count"], 1);
        assert_eq!(body["data"]["servers"][0]["id"], "us1");
    }

    #[tokio::test]
    async fn history_of_unknown_server_is_404() {
        let (state, _tmp, _tx) = test_state();
        let resp = server_history(State(state), Path("nope".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let (state, _tmp, _tx) = test_state();
        state.store.put_server(&server("h1", 3, "DE", None)).unwrap();
        state
            .store
            .insert_history(&[
                HistorySample { server_id: "h1".into(), clients: 1, timestamp: 100 },
                HistorySample { server_id: "h1".into(), clients: 2, timestamp: 200 },
            ])
            .unwrap();

        let resp = server_history(State(state), Path("h1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["data"][0]["timestamp"], 200);
        assert_eq!(body["data"][1]["timestamp"], 100);
    }

    #[tokio::test]
    async fn locales_are_distinct_and_sorted() {
        let (state, _tmp, _tx) = test_state();
        for (id, country) in [("a", "US"), ("b", "DE"), ("c", "US")] {
            state.store.put_server(&server(id, 1, country, None)).unwrap();
        }
        let body = body_json(list_locales(State(state)).await.into_response()).await;
        assert_eq!(body["data"], serde_json::json!(["DE", "US"]));
    }

    #[tokio::test]
    async fn icon_file_serving() {
        let (state, tmp, _tx) = test_state();
        std::fs::write(tmp.path().join("icons/x1_2.png"), b"png-bytes").unwrap();

        let resp = icon_file(State(state.clone()), Path("x1_2.png".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");

        let resp = icon_file(State(state.clone()), Path("..%2Fsecret".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = icon_file(State(state), Path("absent_1.png".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
