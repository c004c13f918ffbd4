//! Security gateway for the consent banner service.
//!
//! This crate provides:
//! - `OriginValidator` - Wildcard origin allow-list checks
//! - `CsrfTokenService` - Signed, session-bound CSRF tokens
//! - `FixedWindowLimiter` - Per-key fixed-window rate limiting
//! - `SecurityHeaders` / `CorsPolicy` - Response header policies
//! - `GuardPipeline` - Ordered, named request guard stages
//!
//! # Example
//!
//! ```ignore
//! use banner_security::{GuardPipeline, RequestFacts};
//!
//! let pipeline = GuardPipeline::standard(origins, csrf, limiter);
//! let report = pipeline.run(&RequestFacts::new(Method::POST, "/api/generate"));
//! if !report.is_allowed() {
//!     // reject
//! }
//! ```

mod csrf;
mod headers;
mod origin;
mod pipeline;
mod ratelimit;

pub use csrf::*;
pub use headers::*;
pub use origin::*;
pub use pipeline::*;
pub use ratelimit::*;
