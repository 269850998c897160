//! Streaming HTTP client for the master list.

use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use tracing::{debug, info};

use srvlist_core::IngestConfig;

use crate::error::IngestError;
use crate::snapshot::{Snapshot, SnapshotOptions, collect_snapshot};

/// Fetches the master list. One GET per run, no retries.
#[derive(Debug, Clone)]
pub struct MasterListClient {
    http: reqwest::Client,
    url: String,
}

impl MasterListClient {
    pub fn new(config: &IngestConfig) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("srvlist/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: config.master_list_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the response body as a chunk stream. A non-2xx status fails
    /// before any byte is read.
    pub async fn open(
        &self,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, IngestError> {
        debug!(url = %self.url, "requesting master list");
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        info!(url = %self.url, status = status.as_u16(), "master list stream opened");
        Ok(response.bytes_stream())
    }

    /// Fetch and collect one snapshot.
    pub async fn fetch_snapshot(&self, options: &SnapshotOptions) -> Result<Snapshot, IngestError> {
        let stream = self.open().await?;
        Ok(collect_snapshot(stream, options).await?)
    }
}
