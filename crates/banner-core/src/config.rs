//! Gateway configuration.
//!
//! Configuration is layered: built-in defaults, then an optional TOML or JSON
//! file, then environment overrides. Environment lookups go through a closure
//! so tests never touch the process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Origins allowed when no `ALLOWED_ORIGINS` override is configured.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:5174",
];

/// Minimum length of the cookie signing secret in production.
pub const MIN_SECRET_LEN: usize = 32;

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("COOKIE_SECRET must be set to at least 32 bytes in production")]
    MissingSecret,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    /// Whether this is a production deployment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Rate limiting settings for the API surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Fixed window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Maximum requests per key per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_window_secs() -> u64 {
    15 * 60
}

fn default_max_requests() -> u32 {
    100
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// CSRF token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfSettings {
    /// Token and cookie lifetime in seconds.
    #[serde(default = "default_csrf_max_age")]
    pub max_age_secs: u64,
    /// Name of the session cookie.
    #[serde(default = "default_csrf_cookie")]
    pub cookie_name: String,
}

fn default_csrf_max_age() -> u64 {
    60 * 60
}

fn default_csrf_cookie() -> String {
    "_csrf".to_string()
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            max_age_secs: default_csrf_max_age(),
            cookie_name: default_csrf_cookie(),
        }
    }
}

/// Startup asset loading policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetLoadSettings {
    /// Directory holding `consent-banner.css` and `consent-banner.js`.
    #[serde(default = "default_asset_dir")]
    pub dir: PathBuf,
    /// Timeout for a single reload attempt in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Attempts at startup before giving up.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Delay between startup attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("assets/banner")
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl Default for AssetLoadSettings {
    fn default() -> Self {
        Self {
            dir: default_asset_dir(),
            timeout_ms: default_timeout_ms(),
            attempts: default_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl AssetLoadSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,

    /// Address to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL used in generated snippets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    /// Allowed origin patterns (supports `*`).
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Secret for signing CSRF cookies and tokens.
    #[serde(default, skip_serializing)]
    pub cookie_secret: Option<String>,

    /// Trust the first `X-Forwarded-For` entry as client identity.
    #[serde(default)]
    pub trust_proxy: bool,

    /// Maximum accepted request body in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Emit JSON logs instead of human-readable lines.
    #[serde(default)]
    pub json_logs: bool,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    #[serde(default)]
    pub csrf: CsrfSettings,

    #[serde(default)]
    pub assets: AssetLoadSettings,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_allowed_origins() -> Vec<String> {
    DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect()
}

fn default_body_limit() -> usize {
    10 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            bind_address: default_bind_address(),
            port: default_port(),
            public_url: None,
            allowed_origins: default_allowed_origins(),
            cookie_secret: None,
            trust_proxy: false,
            body_limit_bytes: default_body_limit(),
            json_logs: false,
            rate_limit: RateLimitSettings::default(),
            csrf: CsrfSettings::default(),
            assets: AssetLoadSettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Load config from a file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let parsed = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(content).map_err(|e| e.to_string())
        } else {
            toml::from_str(content).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Apply overrides from the process environment.
    pub fn with_process_env(self) -> Result<Self, ConfigError> {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(env) = get("BANNER_ENV") {
            self.environment = Environment::from_str(&env).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: "BANNER_ENV".into(),
                    reason: format!("unknown environment '{}'", env),
                }
            })?;
        }

        if let Some(port) = get("PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".into(),
                reason: format!("'{}' is not a valid port", port),
            })?;
        }

        if let Some(addr) = get("BIND_ADDRESS") {
            self.bind_address = addr.trim().to_string();
        }

        if let Some(url) = get("API_URL") {
            self.public_url = Some(url.trim().to_string());
        }

        if let Some(origins) = get("ALLOWED_ORIGINS") {
            let parsed = split_list(&origins);
            if !parsed.is_empty() {
                self.allowed_origins = parsed;
            }
        }

        if let Some(secret) = lookup("COOKIE_SECRET").filter(|v| !v.is_empty()) {
            self.cookie_secret = Some(secret);
        }

        if let Some(dir) = get("ASSET_DIR") {
            self.assets.dir = PathBuf::from(dir.trim());
        }

        if let Some(flag) = get("TRUST_PROXY") {
            self.trust_proxy = parse_bool("TRUST_PROXY", &flag)?;
        }

        if let Some(format) = get("LOG_FORMAT") {
            self.json_logs = format.trim().eq_ignore_ascii_case("json");
        }

        Ok(self)
    }

    /// Validate the configuration as a whole.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment.is_production() {
            match &self.cookie_secret {
                Some(secret) if secret.len() >= MIN_SECRET_LEN => {}
                _ => return Err(ConfigError::MissingSecret),
            }
        }

        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "rate_limit.window_secs".into(),
                reason: "cannot be 0".into(),
            });
        }

        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidValue {
                key: "rate_limit.max_requests".into(),
                reason: "cannot be 0".into(),
            });
        }

        if self.csrf.max_age_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "csrf.max_age_secs".into(),
                reason: "cannot be 0".into(),
            });
        }

        if self.assets.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "assets.attempts".into(),
                reason: "at least one attempt is required".into(),
            });
        }

        if let Some(url) = &self.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    key: "public_url".into(),
                    reason: format!("'{}' must start with http:// or https://", url),
                });
            }
        }

        Ok(())
    }

    /// Base URL embedded into generated snippets.
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    /// Socket address string to bind.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Split a comma-separated list, dropping blank entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{}' is not a boolean", other),
        }),
    }
}
