//! Versioned, integrity-hashed asset snapshots.
//!
//! Readers load the current snapshot without locking. A reload reads both
//! bodies, hashes them and publishes a new snapshot with one atomic store, so
//! readers see either the old pair or the new pair, never a mix. A failed
//! reload publishes nothing.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::integrity::IntegrityHash;
use crate::source::{AssetLoadError, AssetSource};

/// The two banner assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Css,
    Js,
}

impl AssetKind {
    pub const ALL: [AssetKind; 2] = [AssetKind::Css, AssetKind::Js];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Css => "consent-banner.css",
            Self::Js => "consent-banner.js",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Css => "text/css; charset=utf-8",
            Self::Js => "application/javascript; charset=utf-8",
        }
    }

    /// Look up by served file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.file_name() == name)
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css => write!(f, "css"),
            Self::Js => write!(f, "js"),
        }
    }
}

/// Cache-busting version in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetVersion(pub u64);

impl AssetVersion {
    /// Version before the first successful reload.
    pub const UNSET: AssetVersion = AssetVersion(0);

    /// Next version: the clock, or one past `previous` if the clock lags.
    pub fn next(previous: AssetVersion, now_ms: u64) -> AssetVersion {
        AssetVersion(now_ms.max(previous.0.saturating_add(1)))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_set(&self) -> bool {
        *self != Self::UNSET
    }
}

impl std::fmt::Display for AssetVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One asset body and its integrity hash.
#[derive(Debug, Clone)]
pub struct AssetCacheEntry {
    pub content: Arc<[u8]>,
    pub integrity: IntegrityHash,
}

impl AssetCacheEntry {
    /// Hash `content` with SHA-384.
    pub fn new(content: Vec<u8>) -> Self {
        let integrity = IntegrityHash::sha384(&content);
        Self {
            content: content.into(),
            integrity,
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Both assets from one reload.
#[derive(Debug, Clone)]
pub struct AssetSnapshot {
    pub css: AssetCacheEntry,
    pub js: AssetCacheEntry,
    pub version: AssetVersion,
}

impl AssetSnapshot {
    pub fn entry(&self, kind: AssetKind) -> &AssetCacheEntry {
        match kind {
            AssetKind::Css => &self.css,
            AssetKind::Js => &self.js,
        }
    }
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn system_clock_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Holds the current asset snapshot.
pub struct AssetIntegrityCache {
    source: Arc<dyn AssetSource>,
    current: ArcSwapOption<AssetSnapshot>,
    reload_lock: Mutex<()>,
    clock: Clock,
}

impl std::fmt::Debug for AssetIntegrityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetIntegrityCache")
            .field("source", &self.source.describe())
            .field("version", &self.version())
            .finish()
    }
}

impl AssetIntegrityCache {
    pub fn new(source: impl AssetSource + 'static) -> Self {
        Self::from_source(Arc::new(source))
    }

    pub fn from_source(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            current: ArcSwapOption::empty(),
            reload_lock: Mutex::new(()),
            clock: Arc::new(system_clock_ms),
        }
    }

    /// Replace the millisecond clock used for versions.
    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Load both assets and publish them with a new version.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn reload(&self) -> Result<AssetVersion, AssetLoadError> {
        let _guard = self.reload_lock.lock().await;
        debug!(source = %self.source.describe(), "reloading banner assets");

        let (css, js) = futures::try_join!(
            self.source.load(AssetKind::Css),
            self.source.load(AssetKind::Js)
        )?;

        let version = AssetVersion::next(self.version(), (self.clock)());
        let snapshot = AssetSnapshot {
            css: AssetCacheEntry::new(css),
            js: AssetCacheEntry::new(js),
            version,
        };

        info!(
            version = %version,
            css_integrity = %snapshot.css.integrity,
            js_integrity = %snapshot.js.integrity,
            css_bytes = snapshot.css.len(),
            js_bytes = snapshot.js.len(),
            "banner assets loaded"
        );

        self.current.store(Some(Arc::new(snapshot)));
        Ok(version)
    }

    /// Reload, giving up after `timeout`.
    pub async fn reload_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<AssetVersion, AssetLoadError> {
        tokio::time::timeout(timeout, self.reload())
            .await
            .map_err(|_| AssetLoadError::Timeout(timeout))?
    }

    /// Current entry for `kind`.
    pub fn get(&self, kind: AssetKind) -> Option<AssetCacheEntry> {
        self.snapshot().map(|s| s.entry(kind).clone())
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Option<Arc<AssetSnapshot>> {
        self.current.load_full()
    }

    /// Current version, or `AssetVersion::UNSET` before the first load.
    pub fn version(&self) -> AssetVersion {
        match &*self.current.load() {
            Some(snapshot) => snapshot.version,
            None => AssetVersion::UNSET,
        }
    }

    /// Whether a snapshot has been published.
    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticAssetSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    /// Source whose stylesheet can be switched off.
    struct FlakySource {
        css_fails: AtomicBool,
        generation: AtomicU64,
    }

    impl FlakySource {
        fn new() -> Self {
            Self {
                css_fails: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl AssetSource for FlakySource {
        async fn load(&self, kind: AssetKind) -> Result<Vec<u8>, AssetLoadError> {
            match kind {
                AssetKind::Css if self.css_fails.load(Ordering::SeqCst) => {
                    Err(AssetLoadError::Unavailable {
                        kind,
                        reason: "disk on fire".into(),
                    })
                }
                AssetKind::Css => Ok(b".banner{}".to_vec()),
                AssetKind::Js => {
                    let n = self.generation.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("console.log({});", n).into_bytes())
                }
            }
        }

        fn describe(&self) -> String {
            "flaky".into()
        }
    }

    struct SlowSource;

    #[async_trait]
    impl AssetSource for SlowSource {
        async fn load(&self, _kind: AssetKind) -> Result<Vec<u8>, AssetLoadError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            "slow".into()
        }
    }

    #[tokio::test]
    async fn test_not_ready_before_first_load() {
        let cache = AssetIntegrityCache::new(StaticAssetSource::new("a{}", "1;"));
        assert!(!cache.is_ready());
        assert_eq!(cache.version(), AssetVersion::UNSET);
        assert!(cache.get(AssetKind::Js).is_none());
        assert!(cache.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_reload_publishes_hashes() {
        let cache = AssetIntegrityCache::new(StaticAssetSource::new("a{}", "1;"));
        let version = cache.reload().await.unwrap();

        assert!(cache.is_ready());
        assert!(version.is_set());
        assert_eq!(cache.version(), version);

        let js = cache.get(AssetKind::Js).unwrap();
        assert_eq!(&*js.content, b"1;");
        assert_eq!(js.integrity, IntegrityHash::sha384(b"1;"));
        assert!(js.integrity.to_sri().starts_with("sha384-"));

        let snapshot = cache.snapshot().unwrap();
        assert_eq!(snapshot.version, version);
        assert_eq!(&*snapshot.entry(AssetKind::Css).content, b"a{}");
    }

    #[tokio::test]
    async fn test_failed_css_keeps_previous_snapshot() {
        let source = Arc::new(FlakySource::new());
        let cache = AssetIntegrityCache::from_source(source.clone());

        let v1 = cache.reload().await.unwrap();
        let before = cache.snapshot().unwrap();

        source.css_fails.store(true, Ordering::SeqCst);
        let err = cache.reload().await.unwrap_err();
        assert!(matches!(err, AssetLoadError::Unavailable { kind: AssetKind::Css, .. }));

        let after = cache.snapshot().unwrap();
        assert_eq!(cache.version(), v1);
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.js.integrity, before.js.integrity);
    }

    #[tokio::test]
    async fn test_failed_first_load_stays_unready() {
        let source = FlakySource::new();
        source.css_fails.store(true, Ordering::SeqCst);
        let cache = AssetIntegrityCache::new(source);

        assert!(cache.reload().await.is_err());
        assert!(!cache.is_ready());
        assert_eq!(cache.version(), AssetVersion::UNSET);
    }

    #[tokio::test]
    async fn test_version_advances_with_stalled_clock() {
        let cache =
            AssetIntegrityCache::new(StaticAssetSource::new("a{}", "1;")).with_clock(|| 1_000);

        let v1 = cache.reload().await.unwrap();
        let v2 = cache.reload().await.unwrap();
        let v3 = cache.reload().await.unwrap();
        assert_eq!(v1, AssetVersion(1_000));
        assert_eq!(v2, AssetVersion(1_001));
        assert_eq!(v3, AssetVersion(1_002));
    }

    #[tokio::test]
    async fn test_version_advances_when_clock_goes_backwards() {
        let ticks = Arc::new(AtomicU64::new(5_000));
        let clock = ticks.clone();
        let cache = AssetIntegrityCache::new(StaticAssetSource::new("a{}", "1;"))
            .with_clock(move || clock.fetch_sub(1_000, Ordering::SeqCst));

        let v1 = cache.reload().await.unwrap();
        let v2 = cache.reload().await.unwrap();
        assert_eq!(v1, AssetVersion(5_000));
        assert!(v2 > v1);
    }

    #[tokio::test]
    async fn test_concurrent_reloads_yield_distinct_versions() {
        let cache = Arc::new(
            AssetIntegrityCache::new(StaticAssetSource::new("a{}", "1;")).with_clock(|| 42),
        );

        let reloads = (0..16).map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.reload().await })
        });
        let mut versions: Vec<AssetVersion> = futures::future::join_all(reloads)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        versions.sort();
        versions.dedup();
        assert_eq!(versions.len(), 16);
        assert_eq!(cache.version(), *versions.last().unwrap());
    }

    #[tokio::test]
    async fn test_reload_timeout() {
        let cache = AssetIntegrityCache::new(SlowSource);
        let err = cache
            .reload_with_timeout(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetLoadError::Timeout(_)));
        assert!(!cache.is_ready());
    }

    #[tokio::test]
    async fn test_loads_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("consent-banner.css"), ".x{}").unwrap();
        std::fs::write(dir.path().join("consent-banner.js"), "void 0;").unwrap();

        let cache = AssetIntegrityCache::new(crate::source::FsAssetSource::new(dir.path()));
        cache.reload().await.unwrap();
        let css = cache.get(AssetKind::Css).unwrap();
        assert!(css.integrity.verify(b".x{}").is_ok());
    }

    #[test]
    fn test_kind_lookup() {
        assert_eq!(
            AssetKind::from_file_name("consent-banner.js"),
            Some(AssetKind::Js)
        );
        assert_eq!(
            AssetKind::from_file_name("consent-banner.css"),
            Some(AssetKind::Css)
        );
        assert_eq!(AssetKind::from_file_name("other.js"), None);
        assert!(AssetKind::Js.content_type().starts_with("application/javascript"));
    }

    #[test]
    fn test_version_next() {
        assert_eq!(AssetVersion::next(AssetVersion::UNSET, 10), AssetVersion(10));
        assert_eq!(AssetVersion::next(AssetVersion(10), 10), AssetVersion(11));
        assert_eq!(AssetVersion::next(AssetVersion(10), 5), AssetVersion(11));
        assert_eq!(AssetVersion::next(AssetVersion(10), 50), AssetVersion(50));
    }
}
