//! Per-request span and completion logging.

use std::time::Instant;

use banner_core::RequestId;
use tracing::{info_span, Level, Span};

/// Severity a completed request is logged at.
pub fn level_for_status(status: u16) -> Level {
    if status >= 500 {
        Level::ERROR
    } else if status >= 400 {
        Level::WARN
    } else {
        Level::INFO
    }
}

/// Tracks one request from arrival to response.
#[derive(Debug)]
pub struct RequestLog {
    request_id: RequestId,
    method: String,
    path: String,
    span: Span,
    start: Instant,
}

impl RequestLog {
    /// Open the request span.
    pub fn start(request_id: RequestId, method: impl Into<String>, path: impl Into<String>) -> Self {
        let method = method.into();
        let path = path.into();
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );
        Self {
            request_id,
            method,
            path,
            span,
            start: Instant::now(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Span that handler work should run inside.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Emit the completion event and return the elapsed time in microseconds.
    pub fn finish(self, status: u16) -> u64 {
        let elapsed_us = self.elapsed_us();
        let _entered = self.span.enter();
        let method = self.method.as_str();
        let path = self.path.as_str();

        let level = level_for_status(status);
        if level == Level::ERROR {
            tracing::error!(method, path, status, elapsed_us, "request failed");
        } else if level == Level::WARN {
            tracing::warn!(method, path, status, elapsed_us, "request rejected");
        } else {
            tracing::info!(method, path, status, elapsed_us, "request completed");
        }

        elapsed_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::testing::Capture;
    use crate::{build_subscriber, parse_filter, LogFormat};

    #[test]
    fn test_status_levels() {
        assert_eq!(level_for_status(200), Level::INFO);
        assert_eq!(level_for_status(304), Level::INFO);
        assert_eq!(level_for_status(403), Level::WARN);
        assert_eq!(level_for_status(429), Level::WARN);
        assert_eq!(level_for_status(503), Level::ERROR);
    }

    #[test]
    fn test_finish_logs_completion_in_request_span() {
        let capture = Capture::default();
        let subscriber = build_subscriber(
            LogFormat::Json,
            parse_filter("info").unwrap(),
            capture.make_writer(),
        );

        tracing::subscriber::with_default(subscriber, || {
            let log = RequestLog::start(RequestId("abc-123".into()), "POST", "/api/generate");
            assert_eq!(log.request_id().as_str(), "abc-123");
            log.finish(429);
        });

        let lines = capture.json_lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["fields"]["status"], 429);
        assert_eq!(line["fields"]["path"], "/api/generate");
        assert!(line["fields"]["elapsed_us"].is_u64());
        assert_eq!(line["span"]["name"], "request");
        assert_eq!(line["span"]["request_id"], "abc-123");
        assert_eq!(line["span"]["method"], "POST");
    }

    #[test]
    fn test_events_inside_span_are_correlated() {
        let capture = Capture::default();
        let subscriber = build_subscriber(
            LogFormat::Json,
            parse_filter("info").unwrap(),
            capture.make_writer(),
        );

        tracing::subscriber::with_default(subscriber, || {
            let log = RequestLog::start(RequestId("r-9".into()), "GET", "/api/csrf-token");
            log.span().in_scope(|| tracing::info!("issued token"));
            log.finish(200);
        });

        let lines = capture.json_lines();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line["span"]["request_id"], "r-9");
        }
        assert_eq!(lines[1]["fields"]["message"], "request completed");
    }
}
