//! Route handlers.

use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::http::header::{IF_NONE_MATCH, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use banner_assets::{etag_for, header_names, AssetKind, AssetVersion, CachePolicy};
use banner_core::GatewayError;
use banner_security::CorsPolicy;
use banner_snippet::{validate_banner_config, BannerConfigBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{set_header, set_headers, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<AssetVersion>,
    pub timestamp: String,
}

/// Liveness plus asset readiness. 503 until the first load succeeds.
pub async fn health(State(state): State<AppState>) -> Response {
    let version = state.assets.snapshot().map(|s| s.version);
    let (code, status) = match version {
        Some(_) => (StatusCode::OK, "healthy"),
        None => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    let body = HealthResponse {
        status,
        version,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    (code, Json(body)).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Issue a CSRF token and (re)set the session cookie it is bound to.
pub async fn csrf_token(State(state): State<AppState>, jar: CookieJar) -> Response {
    let session = jar
        .get(&state.csrf.policy().cookie_name)
        .map(|c| c.value().to_string());
    let issued = state.csrf.issue(session.as_deref());
    debug!(expires_at = issued.expires_at, "issued csrf token");

    let mut response = Json(CsrfTokenResponse {
        csrf_token: issued.token,
    })
    .into_response();
    set_header(
        response.headers_mut(),
        SET_COOKIE.as_str(),
        &issued.cookie.to_header_value(),
    );
    response
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub installation_code: String,
    pub version: AssetVersion,
}

/// Validate a banner configuration and return its installation snippet.
pub async fn generate(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            state.error(GatewayError::PayloadTooLarge)
        } else {
            state.error(GatewayError::InvalidJson(rejection.body_text()))
        }
    })?;

    let builder: BannerConfigBuilder = serde_json::from_slice(&body)
        .map_err(|e| state.error(GatewayError::InvalidJson(e.to_string())))?;
    let config = builder.build();
    validate_banner_config(&config)
        .map_err(|fields| state.error(GatewayError::ConfigValidationFailed(fields)))?;

    let assets = state
        .assets
        .snapshot()
        .ok_or_else(|| state.error(GatewayError::NotReady))?;
    let installation_code = state
        .generator
        .generate(&config, &assets)
        .map_err(|e| state.error(e))?;

    info!(
        version = %assets.version,
        consent_name = %config.consent_name,
        categories = config.categories.len(),
        "installation code generated"
    );

    Ok(Json(GenerateResponse {
        success: true,
        installation_code,
        version: assets.version,
    }))
}

/// Serve a banner asset from the current snapshot. `?v=` is ignored.
pub async fn asset(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let kind = AssetKind::from_file_name(&file)
        .ok_or_else(|| state.error(GatewayError::NotFound(format!("/banner/{}", file))))?;
    let entry = state
        .assets
        .get(kind)
        .ok_or_else(|| state.error(GatewayError::NotReady))?;
    let etag = etag_for(&entry);

    let not_modified = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|candidate| candidate.trim() == etag));

    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        Body::from(Bytes::copy_from_slice(&entry.content)).into_response()
    };

    let out = response.headers_mut();
    set_header(out, header_names::CONTENT_TYPE, kind.content_type());
    set_header(out, header_names::ETAG, &etag);
    set_headers(out, CachePolicy::static_assets().to_headers());
    set_headers(out, CorsPolicy::public_asset_headers());
    Ok(response)
}

/// Fallback for unknown routes.
pub async fn not_found(State(state): State<AppState>, uri: Uri) -> ApiError {
    state.error(GatewayError::NotFound(uri.path().to_string()))
}
