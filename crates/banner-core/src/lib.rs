//! Core abstractions for the consent banner gateway.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `GatewayConfig` - Layered service configuration (defaults, file, environment)
//! - `Environment` - Deployment environment (affects cookie flags and error verbosity)
//! - `GatewayError` - Error taxonomy with stable machine-readable codes
//! - `RequestId` - Unique request identifier for log correlation

mod config;
mod context;
mod error;

pub use config::*;
pub use context::*;
pub use error::*;
