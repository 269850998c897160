//! Error types for icon resolution.

use thiserror::Error;

/// Why an icon could not be materialized. Callers get the placeholder.
#[derive(Debug, Error)]
pub enum IconError {
    #[error("unsafe server id: {0:?}")]
    UnsafeId(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("icon host returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
