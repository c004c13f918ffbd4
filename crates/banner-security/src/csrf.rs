//! CSRF tokens bound to a signed session cookie.
//!
//! The session cookie carries a random per-session secret signed with the
//! server key. A token is `nonce.issued_at.mac`, where the MAC covers the
//! session secret, the nonce and the issue time. Verification is a pure
//! computation: tokens are never consumed, so the same unexpired token
//! verifies on every request of its session.

use std::time::Duration;

use banner_core::{CsrfSettings, Environment, GatewayError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use http::Method;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Request header carrying the token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";
/// Alternate request header carrying the token.
pub const CSRF_HEADER_ALIAS: &str = "CSRF-Token";

const SESSION_SECRET_LEN: usize = 32;
const NONCE_LEN: usize = 16;
const MAX_CLOCK_SKEW_SECS: i64 = 60;

const SESSION_DOMAIN: &[u8] = b"banner-csrf-session";
const TOKEN_DOMAIN: &[u8] = b"banner-csrf-token";

/// Methods that never require a token.
pub fn is_exempt_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
}

/// `SameSite` attribute for the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
        }
    }
}

/// Cookie and lifetime policy for CSRF tokens.
#[derive(Debug, Clone)]
pub struct CsrfPolicy {
    pub cookie_name: String,
    pub max_age: Duration,
    pub same_site: SameSite,
    pub secure: bool,
}

impl Default for CsrfPolicy {
    fn default() -> Self {
        Self {
            cookie_name: "_csrf".to_string(),
            max_age: Duration::from_secs(60 * 60),
            same_site: SameSite::Strict,
            secure: false,
        }
    }
}

impl CsrfPolicy {
    /// Build from settings; the cookie is `Secure` only in production.
    pub fn from_settings(settings: &CsrfSettings, environment: Environment) -> Self {
        Self {
            cookie_name: settings.cookie_name.clone(),
            max_age: Duration::from_secs(settings.max_age_secs),
            same_site: SameSite::Strict,
            secure: environment.is_production(),
        }
    }
}

/// The session cookie to attach to a token response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfCookie {
    pub name: String,
    pub value: String,
    pub max_age_secs: u64,
    pub same_site: SameSite,
    pub secure: bool,
}

impl CsrfCookie {
    /// Render as a `Set-Cookie` header value. Always `HttpOnly`.
    pub fn to_header_value(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite={}",
            self.name,
            self.value,
            self.max_age_secs,
            self.same_site.as_str()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// A freshly minted token and the cookie that binds it.
#[derive(Debug, Clone)]
pub struct IssuedCsrfToken {
    pub token: String,
    pub cookie: CsrfCookie,
    pub expires_at: i64,
}

/// Why a token was rejected. Only ever logged; callers see `CsrfInvalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CsrfRejection {
    #[error("token missing")]
    MissingToken,

    #[error("session cookie missing")]
    MissingSession,

    #[error("session cookie signature invalid")]
    ForgedSession,

    #[error("token malformed")]
    Malformed,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token issued in the future")]
    NotYetValid,
}

impl From<CsrfRejection> for GatewayError {
    fn from(_: CsrfRejection) -> Self {
        GatewayError::CsrfInvalid
    }
}

/// Issues and verifies CSRF tokens.
pub struct CsrfTokenService {
    key: Vec<u8>,
    policy: CsrfPolicy,
}

impl std::fmt::Debug for CsrfTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfTokenService")
            .field("key", &"<redacted>")
            .field("policy", &self.policy)
            .finish()
    }
}

impl CsrfTokenService {
    /// Create a service signing with `secret`.
    pub fn new(secret: impl AsRef<[u8]>, policy: CsrfPolicy) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
            policy,
        }
    }

    /// Create a service with a random per-process key.
    ///
    /// Tokens do not survive a restart.
    pub fn with_random_key(policy: CsrfPolicy) -> Self {
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key, policy }
    }

    pub fn policy(&self) -> &CsrfPolicy {
        &self.policy
    }

    /// Issue a token, reusing the session of a valid presented cookie.
    pub fn issue(&self, session_cookie: Option<&str>) -> IssuedCsrfToken {
        self.issue_at(session_cookie, current_timestamp())
    }

    /// Issue a token as of `now` (Unix seconds).
    pub fn issue_at(&self, session_cookie: Option<&str>, now: i64) -> IssuedCsrfToken {
        let secret = session_cookie
            .and_then(|c| self.open_session(c).ok())
            .unwrap_or_else(|| {
                let mut secret = vec![0u8; SESSION_SECRET_LEN];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            });

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mac = self.token_mac(&secret, &nonce, now);
        let token = format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(nonce),
            now,
            URL_SAFE_NO_PAD.encode(mac)
        );

        IssuedCsrfToken {
            token,
            cookie: self.seal_session(&secret),
            expires_at: now + self.policy.max_age.as_secs() as i64,
        }
    }

    /// Verify a token for a request.
    pub fn verify(
        &self,
        method: &Method,
        session_cookie: Option<&str>,
        token: Option<&str>,
    ) -> Result<(), CsrfRejection> {
        self.verify_at(method, session_cookie, token, current_timestamp())
    }

    /// Verify a token as of `now` (Unix seconds).
    pub fn verify_at(
        &self,
        method: &Method,
        session_cookie: Option<&str>,
        token: Option<&str>,
        now: i64,
    ) -> Result<(), CsrfRejection> {
        if is_exempt_method(method) {
            return Ok(());
        }

        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(CsrfRejection::MissingToken)?;
        let cookie = session_cookie
            .filter(|c| !c.is_empty())
            .ok_or(CsrfRejection::MissingSession)?;
        let secret = self.open_session(cookie)?;

        let mut parts = token.splitn(3, '.');
        let (Some(nonce), Some(issued_at), Some(mac)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CsrfRejection::Malformed);
        };

        let nonce = URL_SAFE_NO_PAD
            .decode(nonce)
            .ok()
            .filter(|n| n.len() == NONCE_LEN)
            .ok_or(CsrfRejection::Malformed)?;
        let issued_at: i64 = issued_at.parse().map_err(|_| CsrfRejection::Malformed)?;
        let presented = URL_SAFE_NO_PAD
            .decode(mac)
            .map_err(|_| CsrfRejection::Malformed)?;

        let expected = self.token_mac(&secret, &nonce, issued_at);
        if !bool::from(expected.as_slice().ct_eq(presented.as_slice())) {
            return Err(CsrfRejection::BadSignature);
        }

        if issued_at > now + MAX_CLOCK_SKEW_SECS {
            return Err(CsrfRejection::NotYetValid);
        }

        if now - issued_at >= self.policy.max_age.as_secs() as i64 {
            return Err(CsrfRejection::Expired);
        }

        Ok(())
    }

    fn seal_session(&self, secret: &[u8]) -> CsrfCookie {
        let sig = self.mac(&[SESSION_DOMAIN, secret]);
        CsrfCookie {
            name: self.policy.cookie_name.clone(),
            value: format!(
                "{}.{}",
                URL_SAFE_NO_PAD.encode(secret),
                URL_SAFE_NO_PAD.encode(sig)
            ),
            max_age_secs: self.policy.max_age.as_secs(),
            same_site: self.policy.same_site,
            secure: self.policy.secure,
        }
    }

    fn open_session(&self, cookie: &str) -> Result<Vec<u8>, CsrfRejection> {
        let (secret, sig) = cookie
            .split_once('.')
            .ok_or(CsrfRejection::ForgedSession)?;
        let secret = URL_SAFE_NO_PAD
            .decode(secret)
            .ok()
            .filter(|s| s.len() == SESSION_SECRET_LEN)
            .ok_or(CsrfRejection::ForgedSession)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig)
            .map_err(|_| CsrfRejection::ForgedSession)?;

        let expected = self.mac(&[SESSION_DOMAIN, &secret]);
        if bool::from(expected.as_slice().ct_eq(sig.as_slice())) {
            Ok(secret)
        } else {
            Err(CsrfRejection::ForgedSession)
        }
    }

    fn token_mac(&self, secret: &[u8], nonce: &[u8], issued_at: i64) -> Vec<u8> {
        self.mac(&[TOKEN_DOMAIN, secret, nonce, issued_at.to_string().as_bytes()])
    }

    fn mac(&self, parts: &[&[u8]]) -> Vec<u8> {
        // HMAC accepts keys of any length, so construction cannot fail.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        for part in parts {
            mac.update(&(part.len() as u32).to_be_bytes());
            mac.update(part);
        }
        mac.finalize().into_bytes().to_vec()
    }
}

/// Get current Unix timestamp.
fn current_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
