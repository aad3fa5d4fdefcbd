//! Validation policy
//!
//! One [`ValidationPolicy`] per service instance, set at startup and
//! immutable for the process lifetime. Issuer and audience checks are
//! independently toggleable: the delegation model deliberately reuses one
//! token across services that may be registered as different client
//! applications (different audiences) and may span multiple tenant
//! directories (different issuers). Disabling a check is a trust decision
//! scoped to services within one application suite.

use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use passway_core::{AuthError, AuthResult, Header};

/// Issuer validation mode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum IssuerRule {
    /// Accept any issuer (multi-tenant mode)
    #[default]
    Disabled,
    /// `iss` must equal this value exactly
    Exact(String),
}

/// Audience validation mode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum AudienceRule {
    /// Accept any audience (token reused across downstream audiences)
    #[default]
    Disabled,
    /// This value must be a member of `aud`
    Exact(String),
}

/// Per-instance token validation policy.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use passway_auth::policy::ValidationPolicy;
///
/// let policy = ValidationPolicy::new("https://auth.example.com")
///     .with_issuer("https://auth.example.com")
///     .with_audience("https://api.example.com")
///     .with_clock_skew(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Issuer reference keys are resolved against, independent of whether
    /// issuer validation is enabled
    pub key_source: String,
    /// Issuer validation mode
    #[serde(default)]
    pub issuer: IssuerRule,
    /// Audience validation mode
    #[serde(default)]
    pub audience: AudienceRule,
    /// Clock-skew tolerance for `exp` and `nbf`
    #[serde(default = "default_clock_skew", with = "serde_secs")]
    pub clock_skew: Duration,
    /// Signing algorithms the validator accepts
    #[serde(default = "default_algorithms")]
    pub allowed_algorithms: Vec<Algorithm>,
}

fn default_clock_skew() -> Duration {
    Duration::from_secs(60)
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::ES256, Algorithm::RS256, Algorithm::PS256]
}

impl ValidationPolicy {
    /// Policy with both checks disabled, 60 second clock skew, and the
    /// asymmetric algorithm allowlist
    pub fn new(key_source: impl Into<String>) -> Self {
        Self {
            key_source: key_source.into(),
            issuer: IssuerRule::Disabled,
            audience: AudienceRule::Disabled,
            clock_skew: default_clock_skew(),
            allowed_algorithms: default_algorithms(),
        }
    }

    /// Require `iss` to equal this value exactly
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = IssuerRule::Exact(issuer.into());
        self
    }

    /// Require this value to be a member of `aud`
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = AudienceRule::Exact(audience.into());
        self
    }

    /// Set the clock-skew tolerance
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Replace the algorithm allowlist.
    ///
    /// Only asymmetric algorithms belong in a production allowlist; the
    /// symmetric families would let any key holder mint tokens.
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// Resolve and check the header algorithm against the allowlist.
    ///
    /// # Errors
    ///
    /// [`AuthError::AlgorithmNotAllowed`] when the name is unknown or not in
    /// the allowlist.
    pub(crate) fn algorithm(&self, header: &Header) -> AuthResult<Algorithm> {
        let alg: Algorithm = header.alg.parse().map_err(|_| AuthError::AlgorithmNotAllowed {
            alg: header.alg.clone(),
        })?;
        if !self.allowed_algorithms.contains(&alg) {
            return Err(AuthError::AlgorithmNotAllowed {
                alg: header.alg.clone(),
            });
        }
        Ok(alg)
    }
}

/// Serde adapter for durations expressed as whole seconds
pub(crate) mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
