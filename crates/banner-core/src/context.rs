//! Request identity.

use rand::Rng;

/// Header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let mut rng = rand::thread_rng();
        Self(format!("{:x}-{:08x}{:08x}", millis, rng.gen::<u32>(), rng.gen::<u32>()))
    }

    /// Use an inbound ID if it looks sane, otherwise generate one.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(v)
                if !v.is_empty()
                    && v.len() <= 128
                    && v.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                Self(v.to_string())
            }
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_header_accepts_sane_ids() {
        let id = RequestId::from_header(Some("abc-123_x"));
        assert_eq!(id.as_str(), "abc-123_x");
    }

    #[test]
    fn test_from_header_rejects_injection() {
        let id = RequestId::from_header(Some("abc\r\nSet-Cookie: x=1"));
        assert_ne!(id.as_str(), "abc\r\nSet-Cookie: x=1");

        let long = "a".repeat(200);
        assert_ne!(RequestId::from_header(Some(&long)).as_str(), long);
    }
}
