//! srvlist-icons — server icon cache.
//!
//! Icons are fetched from the upstream icon host the first time a page
//! needs them and written under the icon directory as
//! `{server_id}_{icon_version|default}.png`. Successful resolutions are
//! memoized; failures fall back to the placeholder and are retried on the
//! next request.

pub mod cache;
pub mod error;

pub use cache::{ICON_ROUTE, IconCache, icon_file_name, is_safe_file_name};
pub use error::IconError;
