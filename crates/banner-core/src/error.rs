//! Gateway error taxonomy.
//!
//! Every error surfaced to a caller carries a stable machine-readable code and
//! a safe human message. Internal detail is only exposed outside production.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generic message returned for every 5xx in production.
pub const GENERIC_INTERNAL_MESSAGE: &str = "Internal server error occurred";

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field path (e.g., `theme.colors.primary`).
    pub field: String,
    /// Human-readable message.
    pub message: String,
    /// Machine-readable code.
    pub code: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Errors the gateway reports to callers.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Request origin is not in the allow-list.
    #[error("{message}")]
    OriginRejected { message: String },

    /// CSRF token missing, expired or forged.
    #[error("CSRF token validation failed")]
    CsrfInvalid,

    /// Too many requests for this client and route.
    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    /// Banner assets could not be loaded.
    #[error("Failed to load banner assets: {0}")]
    AssetLoadFailed(String),

    /// Banner configuration failed schema validation.
    #[error("Validation failed")]
    ConfigValidationFailed(Vec<FieldError>),

    /// Request body is not valid JSON for the expected shape.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Request body exceeds the configured limit.
    #[error("The request body exceeds the maximum allowed size")]
    PayloadTooLarge,

    /// Asset cache has not been populated yet.
    #[error("Service not ready")]
    NotReady,

    /// No route matched.
    #[error("The requested resource '{0}' was not found")]
    NotFound(String),

    /// Catch-all.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::OriginRejected { .. } => "ORIGIN_REJECTED",
            Self::CsrfInvalid => "CSRF_INVALID",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::AssetLoadFailed(_) => "ASSET_LOAD_FAILED",
            Self::ConfigValidationFailed(_) => "CONFIG_VALIDATION_FAILED",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::NotReady => "SERVICE_NOT_READY",
            Self::NotFound(_) => "RESOURCE_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::OriginRejected { .. } | Self::CsrfInvalid => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ConfigValidationFailed(_) | Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AssetLoadFailed(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short error title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::OriginRejected { .. } => "Origin not allowed",
            Self::CsrfInvalid => "CSRF Error",
            Self::RateLimited { .. } => "Too many requests",
            Self::ConfigValidationFailed(_) => "Validation failed",
            Self::InvalidJson(_) => "Invalid JSON",
            Self::PayloadTooLarge => "Request Entity Too Large",
            Self::NotReady => "Service Unavailable",
            Self::NotFound(_) => "Not Found",
            Self::AssetLoadFailed(_) | Self::Internal(_) => "Internal Server Error",
        }
    }

    /// Check if this is a server-side failure.
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// Build the response body.
    ///
    /// `production` hides internal detail behind a generic message for 5xx.
    pub fn to_body(&self, production: bool) -> ErrorBody {
        let details = match self {
            Self::CsrfInvalid => "Please refresh the page and try again".to_string(),
            Self::InvalidJson(_) if production => {
                "The request body contains invalid JSON".to_string()
            }
            Self::NotReady => "Banner assets are not loaded yet".to_string(),
            _ if self.is_server_error() && production => GENERIC_INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        };

        let fields = match self {
            Self::ConfigValidationFailed(fields) => Some(fields.clone()),
            _ => None,
        };

        ErrorBody {
            error: self.title().to_string(),
            details,
            code: self.code().to_string(),
            fields,
        }
    }
}

/// JSON error body returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (
                GatewayError::OriginRejected {
                    message: "Origin https://evil.test not allowed".into(),
                },
                "ORIGIN_REJECTED",
                403,
            ),
            (GatewayError::CsrfInvalid, "CSRF_INVALID", 403),
            (
                GatewayError::RateLimited {
                    retry_after_secs: 10,
                },
                "RATE_LIMITED",
                429,
            ),
            (GatewayError::ConfigValidationFailed(vec![]), "CONFIG_VALIDATION_FAILED", 400),
            (GatewayError::NotReady, "SERVICE_NOT_READY", 503),
            (GatewayError::Internal("boom".into()), "INTERNAL_SERVER_ERROR", 500),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status().as_u16(), status);
        }
    }

    #[test]
    fn test_production_hides_internal_detail() {
        let err = GatewayError::Internal("database password is hunter2".into());

        let prod = err.to_body(true);
        assert_eq!(prod.details, GENERIC_INTERNAL_MESSAGE);
        assert!(!prod.details.contains("hunter2"));

        let dev = err.to_body(false);
        assert!(dev.details.contains("hunter2"));
    }

    #[test]
    fn test_origin_message_is_surfaced() {
        let err = GatewayError::OriginRejected {
            message: "Origin https://example.com not allowed".into(),
        };
        let body = err.to_body(true);
        assert_eq!(body.details, "Origin https://example.com not allowed");
        assert_eq!(body.code, "ORIGIN_REJECTED");
    }

    #[test]
    fn test_csrf_body_is_generic() {
        let body = GatewayError::CsrfInvalid.to_body(false);
        assert_eq!(body.details, "Please refresh the page and try again");
    }

    #[test]
    fn test_validation_fields_included() {
        let err = GatewayError::ConfigValidationFailed(vec![FieldError::new(
            "text",
            "Banner text must be between 1 and 500 characters",
            "INVALID_TEXT",
        )]);
        let json = serde_json::to_value(err.to_body(true)).unwrap();
        assert_eq!(json["fields"][0]["field"], "text");
        assert_eq!(json["code"], "CONFIG_VALIDATION_FAILED");
    }
}
