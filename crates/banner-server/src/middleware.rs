//! Request middleware: logging, response headers and the guard pipeline.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use banner_assets::CachePolicy;
use banner_core::{RequestId, REQUEST_ID_HEADER};
use banner_observability::RequestLog;
use banner_security::{RequestFacts, CSRF_HEADER, CSRF_HEADER_ALIAS};
use tracing::Instrument;

use crate::error::{set_header, set_headers};
use crate::state::AppState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Runs the request inside a span, echoes the request ID and logs completion.
pub async fn request_log(req: Request, next: Next) -> Response {
    let request_id = RequestId::from_header(header_str(req.headers(), REQUEST_ID_HEADER));
    let log = RequestLog::start(request_id, req.method().as_str(), req.uri().path());

    let mut response = next.run(req).instrument(log.span().clone()).await;

    set_header(
        response.headers_mut(),
        REQUEST_ID_HEADER,
        log.request_id().as_str(),
    );
    log.finish(response.status().as_u16());
    response
}

/// Security headers on every response, no-store caching on the API.
pub async fn response_headers(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let api = req.uri().path().starts_with("/api");
    let mut response = next.run(req).await;

    set_headers(response.headers_mut(), state.security_headers.to_headers());
    if api {
        set_headers(response.headers_mut(), CachePolicy::api().to_headers());
    }
    response
}

/// Origin, CSRF and rate limit checks.
///
/// An allowed `OPTIONS` request is answered here with 204.
pub async fn guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let facts = request_facts(&state, &req);
    let (result, headers) = state.pipeline.run(&facts).into_parts();

    let mut response = match result {
        Err(error) => state.error(error).into_response(),
        Ok(()) if facts.method == Method::OPTIONS => StatusCode::NO_CONTENT.into_response(),
        Ok(()) => next.run(req).await,
    };

    set_headers(response.headers_mut(), headers);
    response
}

fn request_facts(state: &AppState, req: &Request) -> RequestFacts {
    let headers = req.headers();
    let mut facts = RequestFacts::new(req.method().clone(), req.uri().path());

    if let Some(origin) = header_str(headers, "origin") {
        facts = facts.with_origin(origin);
    }
    if let Some(ip) = client_ip(req, state.config.trust_proxy) {
        facts = facts.with_client_ip(ip);
    }

    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(&state.csrf.policy().cookie_name) {
        facts = facts.with_session_cookie(cookie.value());
    }

    if let Some(token) =
        header_str(headers, CSRF_HEADER).or_else(|| header_str(headers, CSRF_HEADER_ALIAS))
    {
        facts = facts.with_csrf_token(token);
    }

    facts
}

/// Client address: the first `X-Forwarded-For` hop behind a trusted proxy,
/// otherwise the socket peer.
fn client_ip(req: &Request, trust_proxy: bool) -> Option<String> {
    if trust_proxy {
        let forwarded = header_str(req.headers(), X_FORWARDED_FOR)
            .and_then(|v| v.split(',').map(str::trim).find(|hop| !hop.is_empty()));
        if let Some(hop) = forwarded {
            return Some(hop.to_string());
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
