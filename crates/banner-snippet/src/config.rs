//! Banner configuration model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default values applied by `BannerConfigBuilder`.
pub mod defaults {
    pub const COOKIE_DURATION: u32 = 365;
    pub const CONSENT_NAME: &str = "_cb_consent";
    pub const TEXT: &str = "This website uses cookies to ensure you get the best experience.";
    pub const DETAILED_TEXT: &str =
        "Click \"Accept\" to enable cookies or \"Preferences\" to choose which cookies to enable.";
    pub const ACCEPT_BUTTON: &str = "Accept All";
    pub const REJECT_BUTTON: &str = "Reject All";
    pub const PREFERENCES_BUTTON: &str = "Preferences";
}

/// Where the widget stores consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StorageType {
    #[default]
    #[serde(rename = "localStorage")]
    LocalStorage,
    #[serde(rename = "cookie")]
    Cookie,
}

/// A cookie category shown in the preferences panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendors: Option<Vec<String>>,
}

/// A third party listed under a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorConfig {
    pub name: String,
    pub description: String,
    pub privacy_policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeColors {
    pub primary: String,
    pub background: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BannerPosition {
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    Custom,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<ThemeColors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<BannerPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ThemeMode>,
}

/// Fully resolved banner configuration passed to the widget.
///
/// Maps are ordered so serialization is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerConfig {
    pub storage_type: StorageType,
    pub cookie_duration: u32,
    pub consent_name: String,
    pub auto_show: bool,
    pub force_show: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy_url: Option<String>,
    pub text: String,
    pub detailed_text: String,
    pub accept_button_text: String,
    pub reject_button_text: String,
    pub preferences_button_text: String,
    pub categories: BTreeMap<String, CategoryConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vendors: BTreeMap<String, VendorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeConfig>,
}

impl Default for BannerConfig {
    fn default() -> Self {
        BannerConfigBuilder::new().build()
    }
}

/// Partial banner configuration merged with defaults.
///
/// Deserializes from a request body in which every field is optional.
/// `build` trims every string value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerConfigBuilder {
    storage_type: Option<StorageType>,
    cookie_duration: Option<u32>,
    consent_name: Option<String>,
    auto_show: Option<bool>,
    force_show: Option<bool>,
    privacy_policy_url: Option<String>,
    text: Option<String>,
    detailed_text: Option<String>,
    accept_button_text: Option<String>,
    reject_button_text: Option<String>,
    preferences_button_text: Option<String>,
    categories: Option<BTreeMap<String, CategoryConfig>>,
    vendors: Option<BTreeMap<String, VendorConfig>>,
    theme: Option<ThemeConfig>,
}

impl BannerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = Some(storage_type);
        self
    }

    pub fn cookie_duration(mut self, days: u32) -> Self {
        self.cookie_duration = Some(days);
        self
    }

    pub fn consent_name(mut self, name: impl Into<String>) -> Self {
        self.consent_name = Some(name.into());
        self
    }

    pub fn auto_show(mut self, auto_show: bool) -> Self {
        self.auto_show = Some(auto_show);
        self
    }

    pub fn force_show(mut self, force_show: bool) -> Self {
        self.force_show = Some(force_show);
        self
    }

    pub fn privacy_policy_url(mut self, url: impl Into<String>) -> Self {
        self.privacy_policy_url = Some(url.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn detailed_text(mut self, text: impl Into<String>) -> Self {
        self.detailed_text = Some(text.into());
        self
    }

    pub fn accept_button_text(mut self, text: impl Into<String>) -> Self {
        self.accept_button_text = Some(text.into());
        self
    }

    pub fn reject_button_text(mut self, text: impl Into<String>) -> Self {
        self.reject_button_text = Some(text.into());
        self
    }

    pub fn preferences_button_text(mut self, text: impl Into<String>) -> Self {
        self.preferences_button_text = Some(text.into());
        self
    }

    /// Add a category.
    pub fn category(mut self, id: impl Into<String>, category: CategoryConfig) -> Self {
        self.categories
            .get_or_insert_with(BTreeMap::new)
            .insert(id.into(), category);
        self
    }

    /// Add a vendor.
    pub fn vendor(mut self, id: impl Into<String>, vendor: VendorConfig) -> Self {
        self.vendors
            .get_or_insert_with(BTreeMap::new)
            .insert(id.into(), vendor);
        self
    }

    pub fn theme(mut self, theme: ThemeConfig) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Resolve into a complete configuration.
    pub fn build(self) -> BannerConfig {
        let text_or = |value: Option<String>, default: &str| {
            value.map(trimmed).unwrap_or_else(|| default.to_string())
        };

        BannerConfig {
            storage_type: self.storage_type.unwrap_or_default(),
            cookie_duration: self.cookie_duration.unwrap_or(defaults::COOKIE_DURATION),
            consent_name: text_or(self.consent_name, defaults::CONSENT_NAME),
            auto_show: self.auto_show.unwrap_or(true),
            force_show: self.force_show.unwrap_or(false),
            privacy_policy_url: self.privacy_policy_url.map(trimmed),
            text: text_or(self.text, defaults::TEXT),
            detailed_text: text_or(self.detailed_text, defaults::DETAILED_TEXT),
            accept_button_text: text_or(self.accept_button_text, defaults::ACCEPT_BUTTON),
            reject_button_text: text_or(self.reject_button_text, defaults::REJECT_BUTTON),
            preferences_button_text: text_or(
                self.preferences_button_text,
                defaults::PREFERENCES_BUTTON,
            ),
            categories: self
                .categories
                .unwrap_or_default()
                .into_iter()
                .map(|(id, c)| (trimmed(id), trim_category(c)))
                .collect(),
            vendors: self
                .vendors
                .unwrap_or_default()
                .into_iter()
                .map(|(id, v)| (trimmed(id), trim_vendor(v)))
                .collect(),
            theme: self.theme.map(trim_theme),
        }
    }
}

fn trimmed(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}

fn trim_category(category: CategoryConfig) -> CategoryConfig {
    CategoryConfig {
        name: trimmed(category.name),
        description: category.description.map(trimmed),
        required: category.required,
        vendors: category
            .vendors
            .map(|v| v.into_iter().map(trimmed).collect()),
    }
}

fn trim_vendor(vendor: VendorConfig) -> VendorConfig {
    VendorConfig {
        name: trimmed(vendor.name),
        description: trimmed(vendor.description),
        privacy_policy: trimmed(vendor.privacy_policy),
    }
}

fn trim_theme(theme: ThemeConfig) -> ThemeConfig {
    ThemeConfig {
        colors: theme.colors.map(|c| ThemeColors {
            primary: trimmed(c.primary),
            background: trimmed(c.background),
            text: trimmed(c.text),
        }),
        ..theme
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BannerConfigBuilder::new().build();
        assert_eq!(config.storage_type, StorageType::LocalStorage);
        assert_eq!(config.cookie_duration, 365);
        assert_eq!(config.consent_name, "_cb_consent");
        assert!(config.auto_show);
        assert!(!config.force_show);
        assert_eq!(config.text, defaults::TEXT);
        assert_eq!(config.accept_button_text, "Accept All");
        assert_eq!(config.reject_button_text, "Reject All");
        assert_eq!(config.preferences_button_text, "Preferences");
        assert!(config.categories.is_empty());
        assert!(config.vendors.is_empty());
        assert_eq!(config, BannerConfig::default());
    }

    #[test]
    fn test_caller_values_override_defaults() {
        let config = BannerConfigBuilder::new()
            .storage_type(StorageType::Cookie)
            .cookie_duration(30)
            .consent_name("my_consent")
            .text("We use cookies.")
            .category(
                "analytics",
                CategoryConfig {
                    name: "Analytics".into(),
                    description: None,
                    required: Some(false),
                    vendors: None,
                },
            )
            .build();

        assert_eq!(config.storage_type, StorageType::Cookie);
        assert_eq!(config.cookie_duration, 30);
        assert_eq!(config.consent_name, "my_consent");
        assert_eq!(config.text, "We use cookies.");
        assert_eq!(config.categories["analytics"].name, "Analytics");
        assert_eq!(config.detailed_text, defaults::DETAILED_TEXT);
    }

    #[test]
    fn test_deserialize_partial_body() {
        let builder: BannerConfigBuilder = serde_json::from_str(
            r#"{
                "storageType": "cookie",
                "text": "  Hello  ",
                "categories": {"necessary": {"name": " Necessary ", "required": true}},
                "theme": {"position": "bottom-left", "mode": "dark"}
            }"#,
        )
        .unwrap();
        let config = builder.build();

        assert_eq!(config.storage_type, StorageType::Cookie);
        assert_eq!(config.text, "Hello");
        assert_eq!(config.categories["necessary"].name, "Necessary");
        let theme = config.theme.unwrap();
        assert_eq!(theme.position, Some(BannerPosition::BottomLeft));
        assert_eq!(theme.mode, Some(ThemeMode::Dark));
    }

    #[test]
    fn test_unknown_storage_type_rejected() {
        let result: Result<BannerConfigBuilder, _> =
            serde_json::from_str(r#"{"storageType": "indexedDb"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_is_camel_case_and_ordered() {
        let config = BannerConfigBuilder::new()
            .category("zeta", CategoryConfig {
                name: "Z".into(),
                description: None,
                required: None,
                vendors: None,
            })
            .category("alpha", CategoryConfig {
                name: "A".into(),
                description: None,
                required: None,
                vendors: None,
            })
            .build();

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.starts_with(r#"{"storageType":"localStorage","cookieDuration":365"#));
        assert!(json.find("\"alpha\"").unwrap() < json.find("\"zeta\"").unwrap());
        assert!(!json.contains("vendors"));
        assert!(!json.contains("privacyPolicyUrl"));
    }
}
