//! Origin allow-list with wildcard patterns.

use banner_core::{split_list, DEFAULT_ALLOWED_ORIGINS};
use serde::{Deserialize, Serialize};

/// Outcome of an origin check. Always produced; never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}

/// Check whether `origin` satisfies `pattern`.
///
/// Without `*` the pattern must equal the origin exactly. Each `*` matches
/// any run of characters, including none and including `.`, `/` and `:`.
/// Every other character is literal. The whole origin must match, and the
/// comparison is case-sensitive.
pub fn match_origin(origin: &str, pattern: &str) -> bool {
    if origin.is_empty() || pattern.is_empty() {
        return false;
    }

    if !pattern.contains('*') {
        return origin == pattern;
    }

    matches_glob(origin.as_bytes(), pattern.as_bytes())
}

// Greedy wildcard walk with single-point backtracking. Works on bytes: a
// literal UTF-8 sequence can only match the same sequence.
fn matches_glob(text: &[u8], pattern: &[u8]) -> bool {
    let (mut t, mut p) = (0, 0);
    let mut last_star: Option<usize> = None;
    let mut resume = 0;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            last_star = Some(p);
            resume = t;
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            t += 1;
            p += 1;
        } else if let Some(star) = last_star {
            p = star + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }

    p == pattern.len()
}

/// Immutable set of allowed origin patterns.
#[derive(Debug, Clone)]
pub struct OriginValidator {
    patterns: Vec<String>,
}

impl OriginValidator {
    /// Create a validator, dropping blank patterns.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(Into::into)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Create from a comma-separated override, falling back to the defaults
    /// when the override is absent or contains no usable entries.
    pub fn from_override(raw: Option<&str>) -> Self {
        let parsed = raw.map(split_list).unwrap_or_default();
        if parsed.is_empty() {
            Self::new(DEFAULT_ALLOWED_ORIGINS.iter().copied())
        } else {
            Self::new(parsed)
        }
    }

    /// Check an origin against the allow-list.
    ///
    /// A request without an `Origin` header is trusted.
    pub fn is_valid(&self, origin: Option<&str>) -> ValidationResult {
        let Some(origin) = origin else {
            return ValidationResult::valid();
        };

        if origin.is_empty() {
            return ValidationResult::invalid("Invalid origin format");
        }

        if self.patterns.iter().any(|p| match_origin(origin, p)) {
            ValidationResult::valid()
        } else {
            ValidationResult::invalid(format!("Origin {} not allowed", origin))
        }
    }

    /// Configured patterns in order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_without_wildcard() {
        assert!(match_origin("https://app.example.com", "https://app.example.com"));
        assert!(!match_origin("https://app.example.com:443", "https://app.example.com"));
        assert!(!match_origin("https://app.example.co", "https://app.example.com"));
    }

    #[test]
    fn test_exact_match_is_equality_for_many_pairs() {
        let values = [
            "https://a.example.com",
            "http://localhost:3000",
            "https://A.example.com",
            "https://a.example.com/",
            "null",
        ];
        for o in values {
            for p in values {
                assert_eq!(match_origin(o, p), o == p, "origin={} pattern={}", o, p);
            }
        }
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(!match_origin("", "https://example.com"));
        assert!(!match_origin("https://example.com", ""));
        assert!(!match_origin("", ""));
        assert!(!match_origin("", "*"));
    }

    #[test]
    fn test_subdomain_wildcard() {
        let pattern = "https://*.example.com";
        assert!(match_origin("https://a.example.com", pattern));
        assert!(match_origin("https://a.b.example.com", pattern));
        assert!(!match_origin("https://example.com", pattern));
        assert!(!match_origin("http://a.example.com", pattern));
        assert!(!match_origin("https://a.example.com.evil.test", pattern));
    }

    #[test]
    fn test_wildcard_matches_empty_and_separators() {
        assert!(match_origin("http://localhost:", "http://localhost:*"));
        assert!(match_origin("http://localhost:5173", "http://localhost:*"));
        assert!(match_origin("https://x/y:z", "https://*"));
        assert!(match_origin("anything", "*"));
    }

    #[test]
    fn test_dot_is_literal() {
        // An unescaped regex would let '.' match any character.
        assert!(!match_origin("https://aXexample.com", "https://*.example.com"));
        assert!(!match_origin("https://a.exampleXcom", "https://*.example.com"));
    }

    #[test]
    fn test_other_metacharacters_are_literal() {
        assert!(match_origin("https://a+b.example.com", "https://a+b.*"));
        assert!(!match_origin("https://aab.example.com", "https://a+b.*"));
        assert!(match_origin("https://(x)|y.test", "https://(x)|*"));
        assert!(!match_origin("https://x.test", "https://(x)|*"));
        assert!(match_origin("https://[::1]:8080", "https://[::1]:*"));
        assert!(!match_origin("https://1:8080", "https://[::1]:*"));
        assert!(match_origin("https://$^?.test", "https://$^?.*"));
    }

    #[test]
    fn test_multiple_wildcards() {
        let pattern = "https://*.cdn.*.example.com";
        assert!(match_origin("https://a.cdn.eu.example.com", pattern));
        assert!(match_origin("https://a.b.cdn.eu.west.example.com", pattern));
        assert!(!match_origin("https://a.cdn.example.com", pattern));
    }

    #[test]
    fn test_match_is_anchored() {
        assert!(!match_origin("xhttps://a.example.com", "https://*.example.com"));
        assert!(!match_origin("https://a.example.comx", "https://*.example.com"));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(!match_origin("https://A.EXAMPLE.COM", "https://*.example.com"));
    }

    #[test]
    fn test_absent_origin_is_valid() {
        let validator = OriginValidator::new(Vec::<String>::new());
        assert_eq!(validator.is_valid(None), ValidationResult::valid());
    }

    #[test]
    fn test_empty_origin_is_invalid() {
        let validator = OriginValidator::new(["https://app.example.com"]);
        let result = validator.is_valid(Some(""));
        assert!(!result.is_valid);
        assert_eq!(result.message.as_deref(), Some("Invalid origin format"));
    }

    #[test]
    fn test_validator_scenario() {
        let validator =
            OriginValidator::new(["https://app.example.com", "https://*.example.com"]);

        let ok = validator.is_valid(Some("https://api.example.com"));
        assert!(ok.is_valid);
        assert_eq!(ok.message, None);

        let denied = validator.is_valid(Some("https://example.com"));
        assert!(!denied.is_valid);
        assert_eq!(
            denied.message.as_deref(),
            Some("Origin https://example.com not allowed")
        );
    }

    #[test]
    fn test_pattern_order_does_not_matter() {
        let a = OriginValidator::new(["https://*.example.com", "https://app.test"]);
        let b = OriginValidator::new(["https://app.test", "https://*.example.com"]);
        for origin in ["https://app.test", "https://x.example.com", "https://nope.test"] {
            assert_eq!(a.is_valid(Some(origin)), b.is_valid(Some(origin)));
        }
    }

    #[test]
    fn test_blank_patterns_dropped() {
        let validator = OriginValidator::new(["", "  ", "https://app.test"]);
        assert_eq!(validator.patterns(), ["https://app.test".to_string()]);
    }

    #[test]
    fn test_from_override() {
        let validator = OriginValidator::from_override(Some("https://a.test, ,https://*.b.test"));
        assert_eq!(validator.patterns().len(), 2);
        assert!(validator.is_valid(Some("https://x.b.test")).is_valid);

        let defaults = OriginValidator::from_override(None);
        assert!(defaults.is_valid(Some("http://localhost:3000")).is_valid);

        let blank = OriginValidator::from_override(Some(" , "));
        assert_eq!(blank.patterns().len(), DEFAULT_ALLOWED_ORIGINS.len());
    }

    #[test]
    fn test_validation_result_serialization() {
        let json = serde_json::to_value(ValidationResult::invalid("nope")).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["message"], "nope");

        let json = serde_json::to_value(ValidationResult::valid()).unwrap();
        assert!(json.get("message").is_none());
    }
}
