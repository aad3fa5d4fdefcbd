//! Token validation
//!
//! [`TokenValidator`] runs a fixed sequence of checks and stops at the first
//! failure: parse, algorithm, signature, time window, issuer, audience.
//! Each stage fails with its own [`AuthError`] kind so callers can tell a
//! parse problem from a trust problem from a policy violation. There is no
//! partial success; a token either yields a [`ValidatedToken`] or one
//! failure reason.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::{debug, warn};

use passway_core::{AuthError, AuthResult, Claims, RawToken, codec};

use crate::keys::KeyResolver;
use crate::policy::{AudienceRule, IssuerRule, ValidationPolicy};

/// A token that passed every validation stage
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    raw: RawToken,
    claims: Claims,
}

impl ValidatedToken {
    /// Validated claims
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// The compact token, unchanged, for delegation
    pub fn raw(&self) -> &RawToken {
        &self.raw
    }

    /// Subject id; present on every validated token
    pub fn subject(&self) -> &str {
        self.claims.sub().unwrap_or("")
    }

    /// Split into the raw token and the claims
    pub fn into_parts(self) -> (RawToken, Claims) {
        (self.raw, self.claims)
    }
}

/// Policy-driven token validator.
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use passway_auth::keys::{KeyResolver, StaticDiscovery};
/// # use passway_auth::policy::ValidationPolicy;
/// # use passway_auth::validator::TokenValidator;
/// # use passway_core::RawToken;
/// # tokio_test::block_on(async {
/// let resolver = Arc::new(KeyResolver::new(Arc::new(StaticDiscovery::new())));
/// let policy = ValidationPolicy::new("https://auth.example.com")
///     .with_issuer("https://auth.example.com")
///     .with_audience("https://api.example.com");
/// let validator = TokenValidator::new(policy, resolver);
///
/// let token = RawToken::new("eyJ0eXAiOiJKV1QiLCJhbGc...");
/// match validator.validate(&token).await {
///     Ok(validated) => println!("token valid for {}", validated.subject()),
///     Err(e) => println!("rejected: {e}"),
/// }
/// # });
/// ```
pub struct TokenValidator {
    policy: ValidationPolicy,
    keys: Arc<KeyResolver>,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Validator over a policy and a key resolver
    pub fn new(policy: ValidationPolicy, keys: Arc<KeyResolver>) -> Self {
        Self { policy, keys }
    }

    /// The configured policy
    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Validate a compact token against the configured policy.
    ///
    /// # Errors
    ///
    /// One of the validation kinds of [`AuthError`], reflecting the first
    /// stage that failed; never a partial result.
    pub async fn validate(&self, raw: &RawToken) -> AuthResult<ValidatedToken> {
        let decoded = codec::decode(raw)?;
        let algorithm = self.policy.algorithm(decoded.header())?;

        let key_id = decoded
            .header()
            .kid
            .clone()
            .ok_or_else(|| AuthError::MalformedToken("header carries no kid".to_string()))?;
        let key = self.keys.resolve(&self.policy.key_source, &key_id).await?;
        verify_signature(raw.as_str(), &key, algorithm)?;

        let claims = decoded.into_claims();
        check_time_window(&claims, unix_now(), self.policy.clock_skew)?;
        check_issuer(&claims, &self.policy.issuer)?;
        check_audience(&claims, &self.policy.audience)?;

        match claims.sub() {
            Some(sub) if !sub.is_empty() => {
                debug!(subject = sub, key_id = %key_id, "token validated");
            }
            _ => return Err(AuthError::MissingClaim { name: "sub" }),
        }

        Ok(ValidatedToken {
            raw: raw.clone(),
            claims,
        })
    }
}

fn verify_signature(token: &str, key: &DecodingKey, algorithm: Algorithm) -> AuthResult<()> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<serde_json::Value>(token, key, &validation).map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::MalformedToken(e.to_string())
        }
        _ => {
            warn!(error = %e, "signature verification rejected token");
            AuthError::InvalidSignature
        }
    })?;
    Ok(())
}

fn check_time_window(claims: &Claims, now: u64, clock_skew: Duration) -> AuthResult<()> {
    let leeway_secs = clock_skew.as_secs();
    let exp = claims.exp().ok_or(AuthError::MissingClaim { name: "exp" })?;
    if exp <= now.saturating_sub(leeway_secs) {
        return Err(AuthError::TokenExpired {
            expired_at: exp,
            leeway_secs,
        });
    }
    if let Some(nbf) = claims.nbf()
        && nbf > now.saturating_add(leeway_secs)
    {
        return Err(AuthError::TokenNotYetValid {
            not_before: nbf,
            leeway_secs,
        });
    }
    Ok(())
}

fn check_issuer(claims: &Claims, rule: &IssuerRule) -> AuthResult<()> {
    match rule {
        IssuerRule::Disabled => Ok(()),
        IssuerRule::Exact(expected) => match claims.iss() {
            Some(iss) if iss == expected => Ok(()),
            found => Err(AuthError::IssuerMismatch {
                expected: expected.clone(),
                found: found.map(str::to_string),
            }),
        },
    }
}

fn check_audience(claims: &Claims, rule: &AudienceRule) -> AuthResult<()> {
    match rule {
        AudienceRule::Disabled => Ok(()),
        AudienceRule::Exact(expected) => match claims.aud() {
            Some(aud) if aud.contains(expected) => Ok(()),
            found => Err(AuthError::AudienceMismatch {
                expected: expected.clone(),
                found: found.map(|aud| aud.to_vec()),
            }),
        },
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
