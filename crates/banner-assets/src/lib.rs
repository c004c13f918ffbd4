//! Asset integrity cache for the consent banner.
//!
//! Loads the banner stylesheet and script, computes their Subresource
//! Integrity hashes and publishes both with a cache-busting version as one
//! immutable snapshot.
//!
//! # Example
//!
//! ```ignore
//! use banner_assets::{AssetIntegrityCache, FsAssetSource};
//!
//! let cache = AssetIntegrityCache::new(FsAssetSource::new("assets/banner"));
//! cache.reload().await?;
//! let snapshot = cache.snapshot().expect("loaded");
//! println!("{}", snapshot.js.integrity);
//! ```

mod cache;
pub mod integrity;
mod policy;
mod source;

pub use cache::*;
pub use integrity::{HashAlgorithm, IntegrityError, IntegrityHash};
pub use policy::*;
pub use source::*;
