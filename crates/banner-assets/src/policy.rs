//! HTTP caching policies for assets and API responses.

use std::time::Duration;

use crate::cache::AssetCacheEntry;

/// Header names for cache responses.
pub mod header_names {
    pub const CACHE_CONTROL: &str = "Cache-Control";
    pub const PRAGMA: &str = "Pragma";
    pub const EXPIRES: &str = "Expires";
    pub const ETAG: &str = "ETag";
    pub const CONTENT_TYPE: &str = "Content-Type";
}

/// How a response may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Shared caches may keep the response and it never changes.
    Immutable { max_age: Duration },
    /// Nothing may cache the response.
    NoStore,
}

impl CachePolicy {
    /// Versioned banner assets: one day, immutable.
    pub fn static_assets() -> Self {
        Self::Immutable {
            max_age: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// API responses.
    pub fn api() -> Self {
        Self::NoStore
    }

    /// The Cache-Control header value.
    pub fn cache_control_header(&self) -> String {
        match self {
            Self::Immutable { max_age } => {
                format!("public, max-age={}, immutable", max_age.as_secs())
            }
            Self::NoStore => "no-store, no-cache, must-revalidate, proxy-revalidate".to_string(),
        }
    }

    /// All caching headers for this policy.
    pub fn to_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            header_names::CACHE_CONTROL.to_string(),
            self.cache_control_header(),
        )];

        if matches!(self, Self::NoStore) {
            headers.push((header_names::PRAGMA.to_string(), "no-cache".to_string()));
            headers.push((header_names::EXPIRES.to_string(), "0".to_string()));
        }

        headers
    }
}

/// Quoted entity tag for an asset, derived from its SRI hash.
pub fn etag_for(entry: &AssetCacheEntry) -> String {
    format!("\"{}\"", entry.integrity.to_sri())
}
