//! Claim normalization
//!
//! Identity providers disagree about which claim carries a user's display
//! name and email; one provider is known to publish the email address under
//! a "name"-labeled claim while the display name sits under a proprietary
//! one. [`ProviderProfile`] is the per-provider lookup table that absorbs
//! the inconsistency, and [`normalize`] projects a validated claim set into
//! one canonical [`Identity`].
//!
//! Normalization never fails: the validator has already guaranteed a
//! subject, and a missing optional claim is an empty field, not an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use passway_core::Claims;

/// Which claim names a provider uses for the canonical identity fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Claim carrying the stable subject id
    #[serde(default = "default_subject_claim")]
    pub subject_claim: String,
    /// Claim carrying the human-readable display name
    #[serde(default = "default_display_name_claim")]
    pub display_name_claim: String,
    /// Claim carrying the email address
    #[serde(default = "default_email_claim")]
    pub email_claim: String,
}

fn default_subject_claim() -> String {
    "sub".to_string()
}

fn default_display_name_claim() -> String {
    "name".to_string()
}

fn default_email_claim() -> String {
    "email".to_string()
}

impl ProviderProfile {
    /// The registered-claim layout: `sub` / `name` / `email`
    pub fn standard() -> Self {
        Self {
            subject_claim: default_subject_claim(),
            display_name_claim: default_display_name_claim(),
            email_claim: default_email_claim(),
        }
    }

    /// Profile with a different subject claim
    pub fn with_subject_claim(mut self, name: impl Into<String>) -> Self {
        self.subject_claim = name.into();
        self
    }

    /// Profile with a different display-name claim
    pub fn with_display_name_claim(mut self, name: impl Into<String>) -> Self {
        self.display_name_claim = name.into();
        self
    }

    /// Profile with a different email claim
    pub fn with_email_claim(mut self, name: impl Into<String>) -> Self {
        self.email_claim = name.into();
        self
    }
}

impl Default for ProviderProfile {
    fn default() -> Self {
        Self::standard()
    }
}

/// Canonical identity record derived from validated claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable subject id, unique per user per issuer
    pub subject: String,
    /// Display name, when the provider published one
    pub display_name: Option<String>,
    /// Email address, when the provider published one
    pub email: Option<String>,
}

/// Project a claim set into a canonical [`Identity`] using a provider's
/// claim layout.
///
/// Falls back to `sub` when the profiled subject claim is absent. Scalar
/// string and number claims are accepted; lists and objects read as absent.
pub fn normalize(claims: &Claims, profile: &ProviderProfile) -> Identity {
    let subject = scalar_string(claims, &profile.subject_claim)
        .or_else(|| scalar_string(claims, "sub"))
        .unwrap_or_default();

    Identity {
        subject,
        display_name: scalar_string(claims, &profile.display_name_claim),
        email: scalar_string(claims, &profile.email_claim),
    }
}

fn scalar_string(claims: &Claims, name: &str) -> Option<String> {
    match claims.get(name)? {
        Value::String(value) if !value.is_empty() => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(entries: serde_json::Value) -> Claims {
        serde_json::from_value(entries).expect("claims object")
    }

    #[test]
    fn test_standard_profile_reads_registered_claims() {
        let claims = claims(json!({
            "sub": "user-42",
            "name": "Alice Example",
            "email": "alice@example.com"
        }));

        let identity = normalize(&claims, &ProviderProfile::standard());
        assert_eq!(identity.subject, "user-42");
        assert_eq!(identity.display_name.as_deref(), Some("Alice Example"));
        assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_profile_absorbs_provider_that_puts_email_under_name() {
        let claims = claims(json!({
            "sub": "user-42",
            "name": "alice@example.com",
            "display_label": "Alice Example"
        }));

        let profile = ProviderProfile::standard()
            .with_email_claim("name")
            .with_display_name_claim("display_label");

        let identity = normalize(&claims, &profile);
        assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
        assert_eq!(identity.display_name.as_deref(), Some("Alice Example"));
    }

    #[test]
    fn test_missing_optional_claims_yield_empty_fields() {
        let claims = claims(json!({"sub": "user-42"}));
        let identity = normalize(&claims, &ProviderProfile::standard());
        assert_eq!(identity.subject, "user-42");
        assert_eq!(identity.display_name, None);
        assert_eq!(identity.email, None);
    }

    #[test]
    fn test_subject_falls_back_to_sub() {
        let claims = claims(json!({"sub": "user-42"}));
        let profile = ProviderProfile::standard().with_subject_claim("oid");
        let identity = normalize(&claims, &profile);
        assert_eq!(identity.subject, "user-42");
    }

    #[test]
    fn test_numeric_subject_is_stringified() {
        let claims = claims(json!({"sub": 42}));
        let identity = normalize(&claims, &ProviderProfile::standard());
        assert_eq!(identity.subject, "42");
    }

    #[test]
    fn test_structured_values_read_as_absent() {
        let claims = claims(json!({
            "sub": "user-42",
            "name": ["Alice", "Example"],
            "email": {"primary": "alice@example.com"}
        }));
        let identity = normalize(&claims, &ProviderProfile::standard());
        assert_eq!(identity.display_name, None);
        assert_eq!(identity.email, None);
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let claims = claims(json!({
            "sub": "user-42",
            "name": "Alice Example",
            "email": "alice@example.com"
        }));
        let profile = ProviderProfile::standard();
        assert_eq!(normalize(&claims, &profile), normalize(&claims, &profile));
    }
}
