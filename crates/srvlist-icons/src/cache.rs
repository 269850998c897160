//! IconCache — memoized, deduplicated icon materialization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use srvlist_core::IconsConfig;
use srvlist_state::ServerView;

use crate::error::IconError;

/// Route prefix under which cached icons are served.
pub const ICON_ROUTE: &str = "/api/icon";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Version segment used in file names and upstream URLs. Version 0 is
/// the same as no version.
fn version_segment(icon_version: Option<u32>) -> String {
    match icon_version {
        Some(v) if v > 0 => v.to_string(),
        _ => "default".to_string(),
    }
}

/// Local file name of a server's icon.
pub fn icon_file_name(server_id: &str, icon_version: Option<u32>) -> String {
    format!("{server_id}_{}.png", version_segment(icon_version))
}

/// Whether `name` is a plain file name safe to join onto the icon directory.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-'))
}

/// Shared by `Arc` between the read API and anything else that renders
/// server lists.
pub struct IconCache {
    http: reqwest::Client,
    dir: PathBuf,
    base_url: String,
    placeholder: String,
    /// server id → public path, successes only. Never invalidated, so a
    /// later version bump keeps serving the first icon until restart.
    memo: RwLock<HashMap<String, String>>,
    /// Per-server locks for resolutions in progress.
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Ceiling on concurrent upstream fetches.
    fetch_limit: Arc<Semaphore>,
}

impl IconCache {
    /// Build the cache, creating `dir` if it does not exist.
    pub fn new(dir: PathBuf, config: &IconsConfig) -> Result<Self, IconError> {
        std::fs::create_dir_all(&dir)?;
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("srvlist/", env!("CARGO_PKG_VERSION")))
            .build()?;
        debug!(dir = %dir.display(), "icon cache ready");
        Ok(Self {
            http,
            dir,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            placeholder: config.placeholder.clone(),
            memo: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            fetch_limit: Arc::new(Semaphore::new(config.fetch_concurrency.max(1))),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Local path for a served file name, or `None` if the name is not a
    /// plain file name.
    pub fn file_path(&self, file_name: &str) -> Option<PathBuf> {
        is_safe_file_name(file_name).then(|| self.dir.join(file_name))
    }

    /// Public path of a server's icon. Never fails: any fault yields the
    /// placeholder.
    pub async fn resolve(&self, server_id: &str, icon_version: Option<u32>) -> String {
        match self.try_resolve(server_id, icon_version).await {
            Ok(path) => path,
            Err(e) => {
                warn!(server_id, ?icon_version, error = %e, "icon unavailable, using placeholder");
                self.placeholder.clone()
            }
        }
    }

    /// Resolve a batch concurrently and discard the results. Warms the
    /// memo so a following per-server `resolve` is a lookup.
    pub async fn preload_icons(self: &Arc<Self>, servers: &[ServerView]) {
        let mut tasks = JoinSet::new();
        for server in servers {
            let cache = Arc::clone(self);
            let id = server.id.clone();
            let version = server.icon_version;
            tasks.spawn(async move {
                cache.resolve(&id, version).await;
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    async fn try_resolve(
        &self,
        server_id: &str,
        icon_version: Option<u32>,
    ) -> Result<String, IconError> {
        if !is_safe_id(server_id) {
            return Err(IconError::UnsafeId(server_id.to_string()));
        }
        if let Some(path) = self.memo.read().await.get(server_id) {
            return Ok(path.clone());
        }

        let key_lock = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(server_id.to_string()).or_default())
        };
        let result = {
            let _guard = key_lock.lock().await;
            self.materialize(server_id, icon_version).await
        };

        // Clones and drops of the key lock happen under `in_flight`, so the
        // last finisher sees only the map's reference and its own.
        let mut in_flight = self.in_flight.lock().await;
        let last = in_flight
            .get(server_id)
            .is_some_and(|current| Arc::ptr_eq(current, &key_lock))
            && Arc::strong_count(&key_lock) == 2;
        if last {
            in_flight.remove(server_id);
        }
        drop(key_lock);
        result
    }

    /// Called with the key lock held.
    async fn materialize(
        &self,
        server_id: &str,
        icon_version: Option<u32>,
    ) -> Result<String, IconError> {
        // A concurrent resolution may have finished while we waited.
        if let Some(path) = self.memo.read().await.get(server_id) {
            return Ok(path.clone());
        }

        let file_name = icon_file_name(server_id, icon_version);
        let public = format!("{ICON_ROUTE}/{file_name}");
        let target = self.dir.join(&file_name);
        if !tokio::fs::try_exists(&target).await? {
            self.download(server_id, icon_version, &target).await?;
        }

        self.memo
            .write()
            .await
            .insert(server_id.to_string(), public.clone());
        Ok(public)
    }

    async fn download(
        &self,
        server_id: &str,
        icon_version: Option<u32>,
        target: &Path,
    ) -> Result<(), IconError> {
        let url = format!(
            "{}/icon/{server_id}/{}.png",
            self.base_url,
            version_segment(icon_version)
        );

        let _permit = self.fetch_limit.acquire().await.ok();
        debug!(%url, "fetching icon");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IconError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let bytes = response.bytes().await?;

        // Readers never observe a partial file.
        let partial = target.with_extension("png.part");
        tokio::fs::write(&partial, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&partial, target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        debug!(path = %target.display(), bytes = bytes.len(), "icon stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Path as UrlPath, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    #[derive(Clone, Default)]
    struct Upstream {
        hits: Arc<AtomicUsize>,
        files: Arc<std::sync::Mutex<Vec<String>>>,
    }

    async fn icon(
        State(upstream): State<Upstream>,
        UrlPath((id, file)): UrlPath<(String, String)>,
    ) -> Result<Vec<u8>, StatusCode> {
        upstream.hits.fetch_add(1, Ordering::SeqCst);
        upstream.files.lock().unwrap().push(format!("{id}/{file}"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        if id.starts_with("missing") || !file.ends_with(".png") {
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(PNG.to_vec())
    }

    async fn upstream() -> (String, Upstream) {
        let state = Upstream::default();
        let app = Router::new()
            .route("/icon/{id}/{file}", get(icon))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    fn cache(dir: &Path, base_url: String) -> Arc<IconCache> {
        let config = IconsConfig {
            base_url,
            ..Default::default()
        };
        Arc::new(IconCache::new(dir.join("icons"), &config).unwrap())
    }

    #[tokio::test]
    async fn fetches_once_and_memoizes() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, upstream) = upstream().await;
        let cache = cache(tmp.path(), url);

        let first = cache.resolve("abc123", Some(4)).await;
        let second = cache.resolve("abc123", Some(4)).await;

        assert_eq!(first, "/api/icon/abc123_4.png");
        assert_eq!(second, first);
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
        let stored = std::fs::read(tmp.path().join("icons/abc123_4.png")).unwrap();
        assert_eq!(stored, PNG);
    }

    #[tokio::test]
    async fn version_bump_keeps_first_cached_icon() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, upstream) = upstream().await;
        let cache = cache(tmp.path(), url);

        let first = cache.resolve("abc123", Some(1)).await;
        let second = cache.resolve("abc123", Some(2)).await;

        assert_eq!(first, "/api/icon/abc123_1.png");
        assert_eq!(second, first);
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
        assert!(!tmp.path().join("icons/abc123_2.png").exists());
    }

    #[tokio::test]
    async fn version_zero_uses_default_icon() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, upstream) = upstream().await;
        let cache = cache(tmp.path(), url);

        assert_eq!(cache.resolve("zero1", Some(0)).await, "/api/icon/zero1_default.png");
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
        assert_eq!(upstream.files.lock().unwrap().as_slice(), ["zero1/default.png"]);
    }

    #[tokio::test]
    async fn in_flight_locks_are_released() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, upstream) = upstream().await;
        let cache = cache(tmp.path(), url);

        let failing = vec![ServerView::placeholder("missing7"); 4];
        cache.preload_icons(&failing).await;
        assert!(cache.in_flight.lock().await.is_empty());
        let after_failures = upstream.hits.load(Ordering::SeqCst);

        let working = vec![ServerView::placeholder("okay7"); 6];
        cache.preload_icons(&working).await;
        assert!(cache.in_flight.lock().await.is_empty());
        assert_eq!(upstream.hits.load(Ordering::SeqCst), after_failures + 1);
    }

    #[tokio::test]
    async fn concurrent_preload_fetches_each_key_once() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, upstream) = upstream().await;
        let cache = cache(tmp.path(), url);

        let mut server = ServerView::placeholder("dup1");
        server.icon_version = None;
        let servers = vec![server.clone(); 8];
        cache.preload_icons(&servers).await;

        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
        assert_eq!(cache.resolve("dup1", None).await, "/api/icon/dup1_default.png");
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_returns_placeholder_and_is_not_memoized() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, upstream) = upstream().await;
        let cache = cache(tmp.path(), url);

        assert_eq!(cache.resolve("missing1", Some(1)).await, "/images/placeholder.jpeg");
        assert_eq!(cache.resolve("missing1", Some(1)).await, "/images/placeholder.jpeg");
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);
        assert!(!tmp.path().join("icons/missing1_1.png").exists());
    }

    #[tokio::test]
    async fn existing_file_is_used_without_fetching() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, upstream) = upstream().await;
        let cache = cache(tmp.path(), url);
        std::fs::write(tmp.path().join("icons/local9_2.png"), PNG).unwrap();

        assert_eq!(cache.resolve("local9", Some(2)).await, "/api/icon/local9_2.png");
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsafe_id_never_reaches_upstream() {
        let tmp = tempfile::tempdir().unwrap();
        let (url, upstream) = upstream().await;
        let cache = cache(tmp.path(), url);

        assert_eq!(cache.resolve("../etc", None).await, cache.placeholder());
        assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn file_names() {
        assert_eq!(icon_file_name("ab", Some(3)), "ab_3.png");
        assert_eq!(icon_file_name("ab", None), "ab_default.png");
        assert_eq!(icon_file_name("ab", Some(0)), "ab_default.png");
        assert!(is_safe_file_name("ab_3.png"));
        assert!(!is_safe_file_name("../ab_3.png"));
        assert!(!is_safe_file_name("a/b.png"));
        assert!(!is_safe_file_name(".hidden"));
    }
}
