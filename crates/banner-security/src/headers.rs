//! Security and CORS response headers.

use http::Method;

use crate::csrf::CSRF_HEADER;

/// Header names set by the gateway.
pub mod header_names {
    pub const CONTENT_SECURITY_POLICY: &str = "Content-Security-Policy";
    pub const X_CONTENT_TYPE_OPTIONS: &str = "X-Content-Type-Options";
    pub const X_XSS_PROTECTION: &str = "X-XSS-Protection";
    pub const CROSS_ORIGIN_OPENER_POLICY: &str = "Cross-Origin-Opener-Policy";
    pub const CROSS_ORIGIN_RESOURCE_POLICY: &str = "Cross-Origin-Resource-Policy";
    pub const REFERRER_POLICY: &str = "Referrer-Policy";

    pub const ACCESS_CONTROL_ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
    pub const ACCESS_CONTROL_ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";
    pub const ACCESS_CONTROL_ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
    pub const ACCESS_CONTROL_ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
    pub const ACCESS_CONTROL_EXPOSE_HEADERS: &str = "Access-Control-Expose-Headers";
    pub const ACCESS_CONTROL_MAX_AGE: &str = "Access-Control-Max-Age";
    pub const VARY: &str = "Vary";

    /// Requests allowed per window.
    pub const RATE_LIMIT_LIMIT: &str = "RateLimit-Limit";
    /// Requests left in the current window.
    pub const RATE_LIMIT_REMAINING: &str = "RateLimit-Remaining";
    /// Seconds until the window resets.
    pub const RATE_LIMIT_RESET: &str = "RateLimit-Reset";
    /// Seconds to wait before retrying (denials only).
    pub const RETRY_AFTER: &str = "Retry-After";
}

/// Content Security Policy as an ordered list of directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSecurityPolicy {
    directives: Vec<(String, Vec<String>)>,
}

impl Default for ContentSecurityPolicy {
    fn default() -> Self {
        Self::empty()
            .directive("default-src", ["'self'"])
            .directive("script-src", ["'self'", "'unsafe-inline'"])
            .directive("style-src", ["'self'", "'unsafe-inline'"])
            .directive("img-src", ["'self'", "data:", "https:"])
            .directive("connect-src", ["'self'"])
            .directive("font-src", ["'self'", "https:"])
            .directive("object-src", ["'none'"])
            .directive("media-src", ["'none'"])
            .directive("frame-src", ["'none'"])
            .directive("base-uri", ["'self'"])
            .directive("form-action", ["'self'"])
            .directive("frame-ancestors", ["'none'"])
    }
}

impl ContentSecurityPolicy {
    /// A policy with no directives.
    pub fn empty() -> Self {
        Self {
            directives: Vec::new(),
        }
    }

    /// Set a directive, replacing any previous sources for it.
    pub fn directive<I, S>(mut self, name: &str, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources: Vec<String> = sources.into_iter().map(Into::into).collect();
        match self.directives.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = sources,
            None => self.directives.push((name.to_string(), sources)),
        }
        self
    }

    pub fn sources(&self, name: &str) -> Option<&[String]> {
        self.directives
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.as_slice())
    }

    pub fn to_header_value(&self) -> String {
        self.directives
            .iter()
            .map(|(name, sources)| {
                if sources.is_empty() {
                    name.clone()
                } else {
                    format!("{} {}", name, sources.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Headers applied to every response.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    pub csp: ContentSecurityPolicy,
    pub referrer_policy: String,
    pub opener_policy: String,
    pub resource_policy: String,
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self {
            csp: ContentSecurityPolicy::default(),
            referrer_policy: "no-referrer".to_string(),
            opener_policy: "same-origin".to_string(),
            resource_policy: "cross-origin".to_string(),
        }
    }
}

impl SecurityHeaders {
    pub fn to_headers(&self) -> Vec<(String, String)> {
        vec![
            (
                header_names::CONTENT_SECURITY_POLICY.to_string(),
                self.csp.to_header_value(),
            ),
            (
                header_names::X_CONTENT_TYPE_OPTIONS.to_string(),
                "nosniff".to_string(),
            ),
            (
                header_names::X_XSS_PROTECTION.to_string(),
                "1; mode=block".to_string(),
            ),
            (
                header_names::CROSS_ORIGIN_OPENER_POLICY.to_string(),
                self.opener_policy.clone(),
            ),
            (
                header_names::CROSS_ORIGIN_RESOURCE_POLICY.to_string(),
                self.resource_policy.clone(),
            ),
            (
                header_names::REFERRER_POLICY.to_string(),
                self.referrer_policy.clone(),
            ),
        ]
    }
}

/// CORS policy for allowed origins on the API.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub max_age_secs: u64,
    pub allow_credentials: bool,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allowed_methods: vec![Method::GET, Method::POST, Method::OPTIONS],
            allowed_headers: vec!["Content-Type".to_string(), CSRF_HEADER.to_string()],
            exposed_headers: vec![CSRF_HEADER.to_string()],
            max_age_secs: 600,
            allow_credentials: true,
        }
    }
}

impl CorsPolicy {
    /// Headers for an actual request from an allowed origin.
    pub fn headers_for(&self, origin: &str) -> Vec<(String, String)> {
        let mut headers = vec![
            (
                header_names::ACCESS_CONTROL_ALLOW_ORIGIN.to_string(),
                origin.to_string(),
            ),
            (header_names::VARY.to_string(), "Origin".to_string()),
        ];

        if self.allow_credentials {
            headers.push((
                header_names::ACCESS_CONTROL_ALLOW_CREDENTIALS.to_string(),
                "true".to_string(),
            ));
        }

        if !self.exposed_headers.is_empty() {
            headers.push((
                header_names::ACCESS_CONTROL_EXPOSE_HEADERS.to_string(),
                self.exposed_headers.join(", "),
            ));
        }

        headers
    }

    /// Headers for a preflight response to an allowed origin.
    pub fn preflight_headers(&self, origin: &str) -> Vec<(String, String)> {
        let mut headers = self.headers_for(origin);
        let methods: Vec<&str> = self.allowed_methods.iter().map(Method::as_str).collect();

        headers.push((
            header_names::ACCESS_CONTROL_ALLOW_METHODS.to_string(),
            methods.join(", "),
        ));
        headers.push((
            header_names::ACCESS_CONTROL_ALLOW_HEADERS.to_string(),
            self.allowed_headers.join(", "),
        ));
        headers.push((
            header_names::ACCESS_CONTROL_MAX_AGE.to_string(),
            self.max_age_secs.to_string(),
        ));
        headers
    }

    /// Headers for public assets any page may embed.
    pub fn public_asset_headers() -> Vec<(String, String)> {
        vec![(
            header_names::ACCESS_CONTROL_ALLOW_ORIGIN.to_string(),
            "*".to_string(),
        )]
    }
}
