//! Shared application state.

use std::sync::Arc;

use banner_assets::AssetIntegrityCache;
use banner_core::{ConfigError, GatewayConfig, GatewayError};
use banner_security::{
    CsrfPolicy, CsrfTokenService, FixedWindowLimiter, GuardPipeline, OriginValidator,
    SecurityHeaders,
};
use banner_snippet::InstallationCodeGenerator;
use tracing::warn;

use crate::error::ApiError;

/// Services shared by every request. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub assets: Arc<AssetIntegrityCache>,
    pub csrf: Arc<CsrfTokenService>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub pipeline: Arc<GuardPipeline>,
    pub generator: Arc<InstallationCodeGenerator>,
    pub security_headers: Arc<SecurityHeaders>,
}

impl AppState {
    /// Wire the services from a validated configuration.
    pub fn new(config: GatewayConfig, assets: Arc<AssetIntegrityCache>) -> Result<Self, ConfigError> {
        let policy = CsrfPolicy::from_settings(&config.csrf, config.environment);
        let csrf = match &config.cookie_secret {
            Some(secret) if !secret.is_empty() => CsrfTokenService::new(secret.as_bytes(), policy),
            _ if config.environment.is_production() => return Err(ConfigError::MissingSecret),
            _ => {
                warn!("COOKIE_SECRET not set, signing CSRF tokens with a per-process key");
                CsrfTokenService::with_random_key(policy)
            }
        };

        let origins = Arc::new(OriginValidator::new(config.allowed_origins.iter()));
        let csrf = Arc::new(csrf);
        let limiter = Arc::new(FixedWindowLimiter::from_settings(&config.rate_limit));
        let pipeline = GuardPipeline::standard(origins, csrf.clone(), limiter.clone());
        let generator = InstallationCodeGenerator::new(config.base_url());

        Ok(Self {
            config: Arc::new(config),
            assets,
            csrf,
            limiter,
            pipeline: Arc::new(pipeline),
            generator: Arc::new(generator),
            security_headers: Arc::new(SecurityHeaders::default()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.config.environment.is_production()
    }

    /// Wrap an error for the response, honoring the environment's verbosity.
    pub fn error(&self, error: impl Into<GatewayError>) -> ApiError {
        ApiError::new(error.into(), self.is_production())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("assets", &self.assets)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
