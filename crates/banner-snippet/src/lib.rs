//! Consent banner configuration and installation snippets.
//!
//! This crate provides:
//! - `BannerConfig` - The fully resolved banner configuration
//! - `BannerConfigBuilder` - Defaults merged with caller-supplied values
//! - `validate_banner_config` - Field-level schema checks
//! - `InstallationCodeGenerator` - The embeddable `<script>` snippet

mod config;
mod generator;
mod validate;

pub use config::*;
pub use generator::*;
pub use validate::*;
