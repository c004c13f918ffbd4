//! Ordered request guard stages.
//!
//! A `GuardPipeline` runs named stages in sequence. Each stage either lets the
//! request continue to the next stage, allows it outright, or denies it with a
//! `GatewayError`. Stages may contribute response headers along the way, and
//! those headers are kept on denial so error responses still carry CORS and
//! rate limit information.

use std::sync::Arc;

use banner_core::GatewayError;
use http::Method;
use tracing::{debug, warn};

use crate::csrf::{is_exempt_method, CsrfTokenService};
use crate::headers::CorsPolicy;
use crate::origin::OriginValidator;
use crate::ratelimit::{rate_limit_key, FixedWindowLimiter};

/// Path exempt from origin and rate limit stages.
pub const HEALTH_PATH: &str = "/api/health";

/// Whether `path` belongs to the guarded API surface.
pub fn is_guarded_api_path(path: &str) -> bool {
    (path == "/api" || path.starts_with("/api/")) && path != HEALTH_PATH
}

/// What the guards need to know about a request.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    pub method: Method,
    pub path: String,
    pub origin: Option<String>,
    pub client_ip: Option<String>,
    pub session_cookie: Option<String>,
    pub csrf_token: Option<String>,
}

impl RequestFacts {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            origin: None,
            client_ip: None,
            session_cookie: None,
            csrf_token: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }
}

/// Result of a single stage.
#[derive(Debug)]
pub enum StageOutcome {
    /// Pass to the next stage.
    Continue,
    /// Accept without running later stages.
    Allow,
    /// Reject the request.
    Deny(GatewayError),
}

/// Mutable state shared by the stages of one run.
#[derive(Debug, Default)]
pub struct StageContext {
    headers: Vec<(String, String)>,
}

impl StageContext {
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    pub fn add_headers(&mut self, headers: impl IntoIterator<Item = (String, String)>) {
        self.headers.extend(headers);
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// A named guard.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, facts: &RequestFacts, ctx: &mut StageContext) -> StageOutcome;
}

/// Final verdict of a pipeline run.
#[derive(Debug)]
pub enum Decision {
    Allow,
    Deny {
        stage: &'static str,
        error: GatewayError,
    },
}

/// Everything a pipeline run produced.
#[derive(Debug)]
pub struct PipelineReport {
    /// Stage names in the order they ran.
    pub visited: Vec<&'static str>,
    /// Response headers contributed by stages.
    pub headers: Vec<(String, String)>,
    pub decision: Decision,
}

impl PipelineReport {
    pub fn is_allowed(&self) -> bool {
        matches!(self.decision, Decision::Allow)
    }

    pub fn error(&self) -> Option<&GatewayError> {
        match &self.decision {
            Decision::Allow => None,
            Decision::Deny { error, .. } => Some(error),
        }
    }

    /// Name of the denying stage.
    pub fn denied_by(&self) -> Option<&'static str> {
        match &self.decision {
            Decision::Allow => None,
            Decision::Deny { stage, .. } => Some(*stage),
        }
    }

    /// Split into the decision and the contributed headers.
    pub fn into_parts(self) -> (Result<(), GatewayError>, Vec<(String, String)>) {
        let result = match self.decision {
            Decision::Allow => Ok(()),
            Decision::Deny { error, .. } => Err(error),
        };
        (result, self.headers)
    }
}

/// Ordered list of guard stages.
#[derive(Default)]
pub struct GuardPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for GuardPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardPipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl GuardPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// The gateway's guards: origin, then CSRF, then rate limit.
    pub fn standard(
        origins: Arc<OriginValidator>,
        csrf: Arc<CsrfTokenService>,
        limiter: Arc<FixedWindowLimiter>,
    ) -> Self {
        Self::new()
            .with_stage(OriginStage::new(origins))
            .with_stage(CsrfStage::new(csrf))
            .with_stage(RateLimitStage::new(limiter))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the stages in order until one allows or denies.
    pub fn run(&self, facts: &RequestFacts) -> PipelineReport {
        let mut ctx = StageContext::default();
        let mut visited = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let name = stage.name();
            visited.push(name);

            match stage.evaluate(facts, &mut ctx) {
                StageOutcome::Continue => continue,
                StageOutcome::Allow => {
                    debug!(stage = name, path = %facts.path, "request allowed early");
                    break;
                }
                StageOutcome::Deny(error) => {
                    warn!(
                        stage = name,
                        code = error.code(),
                        method = %facts.method,
                        path = %facts.path,
                        "request denied"
                    );
                    return PipelineReport {
                        visited,
                        headers: ctx.headers,
                        decision: Decision::Deny { stage: name, error },
                    };
                }
            }
        }

        PipelineReport {
            visited,
            headers: ctx.headers,
            decision: Decision::Allow,
        }
    }
}

/// Rejects API requests from origins outside the allow-list.
///
/// Allowed origins get CORS headers. A preflight from an allowed origin is
/// answered here and skips the remaining stages.
#[derive(Debug)]
pub struct OriginStage {
    validator: Arc<OriginValidator>,
    cors: CorsPolicy,
}

impl OriginStage {
    pub fn new(validator: Arc<OriginValidator>) -> Self {
        Self {
            validator,
            cors: CorsPolicy::default(),
        }
    }

    pub fn with_cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = cors;
        self
    }
}

impl Stage for OriginStage {
    fn name(&self) -> &'static str {
        "origin"
    }

    fn evaluate(&self, facts: &RequestFacts, ctx: &mut StageContext) -> StageOutcome {
        if !is_guarded_api_path(&facts.path) {
            return StageOutcome::Continue;
        }

        let result = self.validator.is_valid(facts.origin.as_deref());
        if !result.is_valid {
            return StageOutcome::Deny(GatewayError::OriginRejected {
                message: result
                    .message
                    .unwrap_or_else(|| "Origin not allowed".to_string()),
            });
        }

        let preflight = facts.method == Method::OPTIONS;
        if let Some(origin) = facts.origin.as_deref() {
            if preflight {
                ctx.add_headers(self.cors.preflight_headers(origin));
            } else {
                ctx.add_headers(self.cors.headers_for(origin));
            }
        }

        if preflight {
            StageOutcome::Allow
        } else {
            StageOutcome::Continue
        }
    }
}

/// Requires a valid CSRF token on state-changing requests.
#[derive(Debug)]
pub struct CsrfStage {
    service: Arc<CsrfTokenService>,
}

impl CsrfStage {
    pub fn new(service: Arc<CsrfTokenService>) -> Self {
        Self { service }
    }
}

impl Stage for CsrfStage {
    fn name(&self) -> &'static str {
        "csrf"
    }

    fn evaluate(&self, facts: &RequestFacts, _ctx: &mut StageContext) -> StageOutcome {
        if is_exempt_method(&facts.method) {
            return StageOutcome::Continue;
        }

        match self.service.verify(
            &facts.method,
            facts.session_cookie.as_deref(),
            facts.csrf_token.as_deref(),
        ) {
            Ok(()) => StageOutcome::Continue,
            Err(rejection) => {
                warn!(reason = %rejection, path = %facts.path, "csrf check failed");
                StageOutcome::Deny(rejection.into())
            }
        }
    }
}

/// Counts API requests per client and route.
#[derive(Debug)]
pub struct RateLimitStage {
    limiter: Arc<FixedWindowLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<FixedWindowLimiter>) -> Self {
        Self { limiter }
    }
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate-limit"
    }

    fn evaluate(&self, facts: &RequestFacts, ctx: &mut StageContext) -> StageOutcome {
        if !is_guarded_api_path(&facts.path) {
            return StageOutcome::Continue;
        }

        let key = rate_limit_key(facts.client_ip.as_deref(), Some(&facts.path));
        let decision = self.limiter.check(&key);
        ctx.add_headers(decision.headers());

        if decision.allowed {
            StageOutcome::Continue
        } else {
            StageOutcome::Deny(GatewayError::RateLimited {
                retry_after_secs: decision.retry_after_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csrf::{CsrfPolicy, CSRF_HEADER};
    use std::time::Duration;

    struct Fixture {
        pipeline: GuardPipeline,
        csrf: Arc<CsrfTokenService>,
        limiter: Arc<FixedWindowLimiter>,
    }

    fn fixture(max_requests: u32) -> Fixture {
        let origins = Arc::new(OriginValidator::new([
            "https://app.example.com",
            "https://*.example.com",
        ]));
        let csrf = Arc::new(CsrfTokenService::new(
            b"0123456789abcdef0123456789abcdef",
            CsrfPolicy::default(),
        ));
        let limiter = Arc::new(FixedWindowLimiter::new(
            Duration::from_secs(900),
            max_requests,
        ));
        Fixture {
            pipeline: GuardPipeline::standard(origins, csrf.clone(), limiter.clone()),
            csrf,
            limiter,
        }
    }

    fn header<'a>(report: &'a PipelineReport, name: &str) -> Option<&'a str> {
        report
            .headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_standard_order() {
        let f = fixture(100);
        assert_eq!(f.pipeline.stage_names(), vec!["origin", "csrf", "rate-limit"]);
    }

    #[test]
    fn test_valid_post_visits_every_stage() {
        let f = fixture(100);
        let issued = f.csrf.issue(None);
        let facts = RequestFacts::new(Method::POST, "/api/generate")
            .with_origin("https://app.example.com")
            .with_client_ip("10.0.0.1")
            .with_session_cookie(issued.cookie.value)
            .with_csrf_token(issued.token);

        let report = f.pipeline.run(&facts);
        assert!(report.is_allowed());
        assert_eq!(report.visited, vec!["origin", "csrf", "rate-limit"]);
        assert_eq!(
            header(&report, "Access-Control-Allow-Origin"),
            Some("https://app.example.com")
        );
        assert_eq!(header(&report, "RateLimit-Remaining"), Some("99"));
    }

    #[test]
    fn test_bad_origin_stops_at_origin() {
        let f = fixture(100);
        let facts = RequestFacts::new(Method::POST, "/api/generate")
            .with_origin("https://example.com");

        let report = f.pipeline.run(&facts);
        assert_eq!(report.visited, vec!["origin"]);
        assert_eq!(report.denied_by(), Some("origin"));
        assert_eq!(report.error().map(|e| e.code()), Some("ORIGIN_REJECTED"));
        assert!(f.limiter.is_empty());
    }

    #[test]
    fn test_missing_csrf_never_reaches_rate_limit() {
        let f = fixture(100);
        let facts = RequestFacts::new(Method::POST, "/api/generate")
            .with_origin("https://api.example.com");

        let report = f.pipeline.run(&facts);
        assert_eq!(report.visited, vec!["origin", "csrf"]);
        assert_eq!(report.error().map(|e| e.code()), Some("CSRF_INVALID"));
        // CORS headers survive the denial.
        assert!(header(&report, "Access-Control-Allow-Origin").is_some());
        assert!(f.limiter.is_empty());
    }

    #[test]
    fn test_get_skips_csrf() {
        let f = fixture(100);
        let report = f.pipeline.run(&RequestFacts::new(Method::GET, "/api/csrf-token"));
        assert!(report.is_allowed());
        assert_eq!(report.visited, vec!["origin", "csrf", "rate-limit"]);
    }

    #[test]
    fn test_rate_limit_denial() {
        let f = fixture(1);
        let facts = RequestFacts::new(Method::GET, "/api/csrf-token").with_client_ip("10.0.0.1");

        assert!(f.pipeline.run(&facts).is_allowed());
        let report = f.pipeline.run(&facts);
        assert_eq!(report.denied_by(), Some("rate-limit"));
        assert!(matches!(
            report.error(),
            Some(GatewayError::RateLimited { .. })
        ));
        assert!(header(&report, "Retry-After").is_some());
    }

    #[test]
    fn test_health_is_exempt() {
        let f = fixture(1);
        let facts = RequestFacts::new(Method::GET, HEALTH_PATH).with_origin("https://evil.test");
        for _ in 0..3 {
            assert!(f.pipeline.run(&facts).is_allowed());
        }
        assert!(f.limiter.is_empty());
    }

    #[test]
    fn test_assets_are_not_origin_checked() {
        let f = fixture(100);
        let facts = RequestFacts::new(Method::GET, "/banner/consent-banner.js")
            .with_origin("https://any-site.test");
        let report = f.pipeline.run(&facts);
        assert!(report.is_allowed());
        assert!(report.headers.is_empty());
    }

    #[test]
    fn test_preflight_short_circuits() {
        let f = fixture(100);
        let facts = RequestFacts::new(Method::OPTIONS, "/api/generate")
            .with_origin("https://app.example.com");

        let report = f.pipeline.run(&facts);
        assert!(report.is_allowed());
        assert_eq!(report.visited, vec!["origin"]);
        assert_eq!(header(&report, "Access-Control-Max-Age"), Some("600"));
        assert!(header(&report, "Access-Control-Allow-Headers")
            .is_some_and(|v| v.contains(CSRF_HEADER)));
    }

    #[test]
    fn test_preflight_from_bad_origin_denied() {
        let f = fixture(100);
        let facts =
            RequestFacts::new(Method::OPTIONS, "/api/generate").with_origin("https://evil.test");
        assert_eq!(f.pipeline.run(&facts).denied_by(), Some("origin"));
    }

    struct Named(&'static str, fn() -> StageOutcome);

    impl Stage for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn evaluate(&self, _facts: &RequestFacts, _ctx: &mut StageContext) -> StageOutcome {
            (self.1)()
        }
    }

    #[test]
    fn test_custom_stages_run_in_order() {
        let pipeline = GuardPipeline::new()
            .with_stage(Named("first", || StageOutcome::Continue))
            .with_stage(Named("second", || StageOutcome::Allow))
            .with_stage(Named("third", || StageOutcome::Deny(GatewayError::CsrfInvalid)));

        let report = pipeline.run(&RequestFacts::new(Method::GET, "/"));
        assert!(report.is_allowed());
        assert_eq!(report.visited, vec!["first", "second"]);
    }

    #[test]
    fn test_empty_pipeline_allows() {
        let report = GuardPipeline::new().run(&RequestFacts::new(Method::POST, "/api/generate"));
        assert!(report.is_allowed());
        assert!(report.visited.is_empty());
    }

    #[test]
    fn test_guarded_paths() {
        assert!(is_guarded_api_path("/api/generate"));
        assert!(is_guarded_api_path("/api/csrf-token"));
        assert!(is_guarded_api_path("/api"));
        assert!(!is_guarded_api_path("/api/health"));
        assert!(!is_guarded_api_path("/apiary"));
        assert!(!is_guarded_api_path("/banner/consent-banner.css"));
    }
}
