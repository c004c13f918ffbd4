//! Process bootstrap: asset preloading, background tasks and serving.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use banner_assets::{
    AssetIntegrityCache, AssetKind, AssetLoadError, AssetVersion, FsAssetSource,
};
use banner_core::{AssetLoadSettings, GatewayConfig};
use banner_security::FixedWindowLimiter;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::build_router;
use crate::state::AppState;

/// Load assets, retrying up to `settings.attempts` times.
///
/// Each attempt is bounded by `settings.timeout()`.
pub async fn preload_assets(
    cache: &AssetIntegrityCache,
    settings: &AssetLoadSettings,
) -> Result<AssetVersion, AssetLoadError> {
    let attempts = settings.attempts.max(1);
    let mut attempt = 1;

    loop {
        match cache.reload_with_timeout(settings.timeout()).await {
            Ok(version) => return Ok(version),
            Err(e) if attempt < attempts => {
                warn!(attempt, attempts, error = %e, "banner asset load failed, retrying");
                tokio::time::sleep(settings.retry_delay()).await;
                attempt += 1;
            }
            Err(e) => {
                error!(attempts, error = %e, "banner asset load failed");
                return Err(e);
            }
        }
    }
}

/// Periodically drop expired rate limit windows.
pub fn spawn_limiter_pruner(limiter: Arc<FixedWindowLimiter>) -> JoinHandle<()> {
    let period = limiter.window();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.prune();
            if removed > 0 {
                debug!(removed, remaining = limiter.len(), "pruned rate limit windows");
            }
        }
    })
}

/// Reload assets on demand. Failures keep the last good snapshot.
pub async fn reload_assets(cache: &AssetIntegrityCache, timeout: Duration) -> Option<AssetVersion> {
    match cache.reload_with_timeout(timeout).await {
        Ok(version) => Some(version),
        Err(e) => {
            error!(
                error = %e,
                version = %cache.version(),
                "banner asset reload failed, keeping last good snapshot"
            );
            None
        }
    }
}

/// Reload assets whenever the process receives `SIGHUP`.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(
    cache: Arc<AssetIntegrityCache>,
    timeout: Duration,
) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received, reloading banner assets");
            reload_assets(&cache, timeout).await;
        }
    }))
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Run the gateway until a shutdown signal arrives.
pub async fn serve(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        environment = %config.environment,
        asset_dir = %config.assets.dir.display(),
        "starting consent banner gateway"
    );

    let cache = Arc::new(AssetIntegrityCache::new(FsAssetSource::new(
        config.assets.dir.clone(),
    )));
    let version = preload_assets(&cache, &config.assets)
        .await
        .context("failed to load banner assets")?;
    info!(%version, "banner assets ready");

    let reload_timeout = config.assets.timeout();
    let state = AppState::new(config, cache.clone()).context("invalid configuration")?;

    spawn_limiter_pruner(state.limiter.clone());
    #[cfg(unix)]
    spawn_reload_on_hangup(cache, reload_timeout).context("failed to install SIGHUP handler")?;
    #[cfg(not(unix))]
    let _ = reload_timeout;

    let address = state.config.listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!(
        address = %address,
        base_url = %state.generator.base_url(),
        origins = state.config.allowed_origins.len(),
        "listening"
    );

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("gateway stopped");
    Ok(())
}

/// Integrity details of one asset.
#[derive(Debug, Serialize)]
pub struct AssetDigest {
    pub file: &'static str,
    pub integrity: String,
    pub bytes: usize,
}

/// What `banner-gateway hash` prints.
#[derive(Debug, Serialize)]
pub struct AssetReport {
    pub version: AssetVersion,
    pub assets: Vec<AssetDigest>,
}

/// Load the configured assets once and describe them.
pub async fn asset_report(settings: &AssetLoadSettings) -> Result<AssetReport, AssetLoadError> {
    let cache = AssetIntegrityCache::new(FsAssetSource::new(settings.dir.clone()));
    let version = cache.reload_with_timeout(settings.timeout()).await?;

    let assets = AssetKind::ALL
        .iter()
        .filter_map(|kind| {
            cache.get(*kind).map(|entry| AssetDigest {
                file: kind.file_name(),
                integrity: entry.integrity.to_sri(),
                bytes: entry.len(),
            })
        })
        .collect();

    Ok(AssetReport { version, assets })
}
