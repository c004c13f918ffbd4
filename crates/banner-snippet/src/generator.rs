//! Installation snippet generation.

use banner_assets::{AssetKind, AssetSnapshot};
use banner_core::GatewayError;
use serde::Serialize;
use tracing::debug;

use crate::config::BannerConfig;

/// Path prefix under which banner assets are served.
pub const ASSET_ROUTE_PREFIX: &str = "/banner";

/// Snippet generation errors.
#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
    #[error("failed to serialize banner config: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<SnippetError> for GatewayError {
    fn from(err: SnippetError) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

/// Builds the HTML snippet a site embeds to load the banner.
#[derive(Debug, Clone)]
pub struct InstallationCodeGenerator {
    base_url: String,
}

impl InstallationCodeGenerator {
    /// Create a generator for assets served from `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Public URL of an asset for a given snapshot.
    pub fn asset_url(&self, kind: AssetKind, assets: &AssetSnapshot) -> String {
        format!(
            "{}{}/{}?v={}",
            self.base_url,
            ASSET_ROUTE_PREFIX,
            kind.file_name(),
            assets.version
        )
    }

    /// Render the snippet.
    ///
    /// The output depends only on the arguments and the base URL.
    pub fn generate(
        &self,
        config: &BannerConfig,
        assets: &AssetSnapshot,
    ) -> Result<String, SnippetError> {
        let config_json = script_safe_json(config)?;
        let js_src = script_safe_json(&self.asset_url(AssetKind::Js, assets))?;
        let js_integrity = script_safe_json(&assets.js.integrity.to_sri())?;
        let css_href = script_safe_json(&self.asset_url(AssetKind::Css, assets))?;
        let css_integrity = script_safe_json(&assets.css.integrity.to_sri())?;

        debug!(version = %assets.version, "generating installation code");

        Ok(format!(
            r#"<!-- Consent Banner -->
<script>
  (function() {{
    var script = document.createElement('script');
    script.src = {js_src};
    script.integrity = {js_integrity};
    script.crossOrigin = "anonymous";

    var style = document.createElement('link');
    style.rel = "stylesheet";
    style.href = {css_href};
    style.integrity = {css_integrity};
    style.crossOrigin = "anonymous";

    script.onload = function() {{
      window.CookieConsentBanner.init({config_json});
    }};

    document.head.appendChild(style);
    document.body.appendChild(script);
  }})();
</script>"#
        ))
    }
}

/// Serialize to JSON that is safe inside an HTML `<script>` element.
///
/// `<`, `>` and `&` are escaped so the payload cannot close the element or
/// open a comment. U+2028 and U+2029 are escaped because older engines treat
/// them as line terminators inside string literals.
pub fn script_safe_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    Ok(out)
}
