//! Error responses.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use banner_core::GatewayError;
use banner_security::header_names;
use tracing::error;

/// A `GatewayError` rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError {
    error: GatewayError,
    production: bool,
}

impl ApiError {
    pub fn new(error: GatewayError, production: bool) -> Self {
        Self { error, production }
    }

    pub fn error(&self) -> &GatewayError {
        &self.error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.error.is_server_error() {
            error!(code = self.error.code(), error = %self.error, "request failed");
        }

        let status = self.error.status();
        let mut response = (status, Json(self.error.to_body(self.production))).into_response();

        if let GatewayError::RateLimited { retry_after_secs } = &self.error {
            set_header(
                response.headers_mut(),
                header_names::RETRY_AFTER,
                &retry_after_secs.to_string(),
            );
        }

        response
    }
}

/// Insert a header, replacing any existing value. Invalid pairs are skipped.
pub(crate) fn set_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => tracing::debug!(name, "skipping invalid response header"),
    }
}

/// Insert every pair.
pub(crate) fn set_headers(headers: &mut HeaderMap, pairs: impl IntoIterator<Item = (String, String)>) {
    for (name, value) in pairs {
        set_header(headers, &name, &value);
    }
}
