//! Where asset bodies come from.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use banner_core::GatewayError;

use crate::cache::AssetKind;

/// Asset loading errors.
#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("failed to read {kind} asset from {path}: {source}")]
    Read {
        kind: AssetKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} asset unavailable: {reason}")]
    Unavailable { kind: AssetKind, reason: String },

    #[error("asset reload timed out after {0:?}")]
    Timeout(Duration),
}

impl From<AssetLoadError> for GatewayError {
    fn from(err: AssetLoadError) -> Self {
        GatewayError::AssetLoadFailed(err.to_string())
    }
}

/// Provides raw asset bodies.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Load the current body of `kind`.
    async fn load(&self, kind: AssetKind) -> Result<Vec<u8>, AssetLoadError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// Reads `consent-banner.css` and `consent-banner.js` from a directory.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    dir: PathBuf,
}

impl FsAssetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: AssetKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

#[async_trait]
impl AssetSource for FsAssetSource {
    async fn load(&self, kind: AssetKind) -> Result<Vec<u8>, AssetLoadError> {
        let path = self.path_for(kind);
        tokio::fs::read(&path)
            .await
            .map_err(|source| AssetLoadError::Read { kind, path, source })
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Fixed in-memory bodies.
#[derive(Debug, Clone, Default)]
pub struct StaticAssetSource {
    css: Vec<u8>,
    js: Vec<u8>,
}

impl StaticAssetSource {
    pub fn new(css: impl Into<Vec<u8>>, js: impl Into<Vec<u8>>) -> Self {
        Self {
            css: css.into(),
            js: js.into(),
        }
    }
}

#[async_trait]
impl AssetSource for StaticAssetSource {
    async fn load(&self, kind: AssetKind) -> Result<Vec<u8>, AssetLoadError> {
        Ok(match kind {
            AssetKind::Css => self.css.clone(),
            AssetKind::Js => self.js.clone(),
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_source_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("consent-banner.css"), "a{}").unwrap();
        std::fs::write(dir.path().join("consent-banner.js"), "1;").unwrap();

        let source = FsAssetSource::new(dir.path());
        assert_eq!(source.load(AssetKind::Css).await.unwrap(), b"a{}");
        assert_eq!(source.load(AssetKind::Js).await.unwrap(), b"1;");
        assert_eq!(source.describe(), dir.path().display().to_string());
    }

    #[tokio::test]
    async fn test_fs_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsAssetSource::new(dir.path());

        let err = source.load(AssetKind::Js).await.unwrap_err();
        assert!(matches!(err, AssetLoadError::Read { kind: AssetKind::Js, .. }));
        assert!(err.to_string().contains("consent-banner.js"));
    }

    #[test]
    fn test_converts_to_gateway_error() {
        let err: GatewayError = AssetLoadError::Timeout(Duration::from_secs(5)).into();
        assert_eq!(err.code(), "ASSET_LOAD_FAILED");
    }
}
