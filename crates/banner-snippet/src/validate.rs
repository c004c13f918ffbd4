//! Schema checks for a resolved `BannerConfig`.

use banner_core::FieldError;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{BannerConfig, ThemeConfig, VendorConfig};

static CONSENT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid consent name regex"));
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://.+").expect("valid url regex"));
static HEX_COLOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").expect("valid hex color regex")
});

pub const MAX_CONSENT_NAME_LEN: usize = 50;
pub const MAX_TEXT_LEN: usize = 500;
pub const MAX_BUTTON_TEXT_LEN: usize = 50;
pub const COOKIE_DURATION_RANGE: std::ops::RangeInclusive<u32> = 1..=365;

/// Check a `#rgb` or `#rrggbb` color.
pub fn is_valid_hex_color(value: &str) -> bool {
    HEX_COLOR.is_match(value)
}

/// Check an `http://` or `https://` URL.
pub fn is_valid_url(value: &str) -> bool {
    URL.is_match(value)
}

/// Validate every field, collecting all failures.
pub fn validate_banner_config(config: &BannerConfig) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if !COOKIE_DURATION_RANGE.contains(&config.cookie_duration) {
        errors.push(FieldError::new(
            "cookieDuration",
            "Cookie duration must be between 1 and 365 days",
            "INVALID_DURATION",
        ));
    }

    let name_len = config.consent_name.chars().count();
    if name_len == 0 || name_len > MAX_CONSENT_NAME_LEN {
        errors.push(FieldError::new(
            "consentName",
            "Consent name must be between 1 and 50 characters",
            "INVALID_NAME",
        ));
    } else if !CONSENT_NAME.is_match(&config.consent_name) {
        errors.push(FieldError::new(
            "consentName",
            "Consent name may only contain letters, digits, '_' and '-'",
            "INVALID_NAME",
        ));
    }

    check_length(&mut errors, "text", &config.text, 1, MAX_TEXT_LEN, "INVALID_TEXT");
    check_length(
        &mut errors,
        "detailedText",
        &config.detailed_text,
        0,
        MAX_TEXT_LEN,
        "INVALID_TEXT",
    );

    for (field, value) in [
        ("acceptButtonText", &config.accept_button_text),
        ("rejectButtonText", &config.reject_button_text),
        ("preferencesButtonText", &config.preferences_button_text),
    ] {
        check_length(
            &mut errors,
            field,
            value,
            1,
            MAX_BUTTON_TEXT_LEN,
            "INVALID_BUTTON_TEXT",
        );
    }

    if let Some(url) = &config.privacy_policy_url {
        if !is_valid_url(url) {
            errors.push(FieldError::new(
                "privacyPolicyUrl",
                "Privacy policy URL must start with http:// or https://",
                "INVALID_PRIVACY_URL",
            ));
        }
    }

    for (id, category) in &config.categories {
        if id.is_empty() || category.name.is_empty() {
            errors.push(FieldError::new(
                format!("categories.{}.name", id),
                "Categories configuration is invalid",
                "INVALID_CATEGORIES",
            ));
        }
    }

    for (id, vendor) in &config.vendors {
        validate_vendor(&mut errors, id, vendor);
    }

    if let Some(theme) = &config.theme {
        validate_theme(&mut errors, theme);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_length(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
    code: &str,
) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.push(FieldError::new(
            field,
            format!("{} must be between {} and {} characters", field, min, max),
            code,
        ));
    }
}

fn validate_vendor(errors: &mut Vec<FieldError>, id: &str, vendor: &VendorConfig) {
    if vendor.name.is_empty() {
        errors.push(FieldError::new(
            format!("vendors.{}.name", id),
            format!("Missing or invalid vendor name for {}", id),
            "INVALID_VENDOR_NAME",
        ));
    }

    if vendor.description.is_empty() {
        errors.push(FieldError::new(
            format!("vendors.{}.description", id),
            format!("Missing or invalid vendor description for {}", id),
            "INVALID_VENDOR_DESCRIPTION",
        ));
    }

    if !is_valid_url(&vendor.privacy_policy) {
        errors.push(FieldError::new(
            format!("vendors.{}.privacyPolicy", id),
            format!("Invalid privacy policy URL for {}", id),
            "INVALID_PRIVACY_URL",
        ));
    }
}

fn validate_theme(errors: &mut Vec<FieldError>, theme: &ThemeConfig) {
    let Some(colors) = &theme.colors else {
        return;
    };

    for (field, value) in [
        ("primary", &colors.primary),
        ("background", &colors.background),
        ("text", &colors.text),
    ] {
        if !is_valid_hex_color(value) {
            errors.push(FieldError::new(
                format!("theme.colors.{}", field),
                "Invalid color format",
                "INVALID_COLOR_FORMAT",
            ));
        }
    }
}
