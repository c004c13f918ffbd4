//! HTTP service for the consent banner gateway.
//!
//! - `AppState` - Shared services behind every handler
//! - `build_router` - Routes plus the request log, header and guard middleware
//! - `startup` - Asset preloading, background tasks and the serve loop

mod app;
mod error;
mod handlers;
mod middleware;
mod state;
pub mod startup;

pub use app::build_router;
pub use error::ApiError;
pub use state::AppState;
