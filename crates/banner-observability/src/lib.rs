//! Observability for the consent banner gateway.
//!
//! - `init_tracing` - Installs the global `tracing` subscriber (JSON or human)
//! - `RequestLog` - Per-request span and completion event

mod logging;
mod request;

pub use logging::*;
pub use request::*;
