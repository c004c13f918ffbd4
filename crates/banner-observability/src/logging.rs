//! Global `tracing` subscriber setup.

use std::fmt;

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (for production/log aggregation).
    Json,
    /// Compact human-readable lines (for development).
    #[default]
    Human,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "human" | "text" | "pretty" => Some(Self::Human),
            _ => None,
        }
    }

    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Human
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Human => write!(f, "human"),
        }
    }
}

/// Subscriber setup errors.
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("invalid log filter '{directives}': {reason}")]
    InvalidFilter { directives: String, reason: String },

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Parse filter directives such as `info,banner_security=debug`.
pub fn parse_filter(directives: &str) -> Result<EnvFilter, ObservabilityError> {
    EnvFilter::try_new(directives).map_err(|e| ObservabilityError::InvalidFilter {
        directives: directives.to_string(),
        reason: e.to_string(),
    })
}

/// Filter from `RUST_LOG`, or `default_directive` when it is unset or blank.
pub fn filter_from_env(default_directive: &str) -> Result<EnvFilter, ObservabilityError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => parse_filter(&directives),
        _ => parse_filter(default_directive),
    }
}

fn format_layer<W>(format: LogFormat, writer: W) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(true)
                .with_span_list(true),
        ),
        LogFormat::Human => Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(writer)
                .with_target(false),
        ),
    }
}

/// Build a subscriber writing to `writer`.
pub fn build_subscriber<W>(
    format: LogFormat,
    filter: EnvFilter,
    writer: W,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> =
        vec![format_layer(format, writer), Box::new(filter)];
    Registry::default().with(layers)
}

/// Install the process-wide subscriber, logging to stderr.
pub fn init_tracing(format: LogFormat, default_directive: &str) -> Result<(), ObservabilityError> {
    let filter = filter_from_env(default_directive)?;
    let subscriber = build_subscriber(format, filter, std::io::stderr);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ObservabilityError::AlreadyInitialized(e.to_string()))
}
