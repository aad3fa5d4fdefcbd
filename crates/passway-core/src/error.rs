//! Error taxonomy for bearer validation and delegation
//!
//! Every failure a caller can observe is a distinct [`AuthError`] kind, so
//! request-handling code can map each one to the correct response semantics
//! without string matching. Parse failures ([`AuthError::MalformedToken`])
//! and trust failures ([`AuthError::InvalidSignature`], the mismatch kinds)
//! are deliberately separate.

use thiserror::Error;

/// Result type for validation and delegation operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Failure kinds surfaced by token validation, key resolution, and delegation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authorization header, or the scheme is not `Bearer`
    #[error("no bearer credential on request")]
    MissingCredential,

    /// Token is structurally invalid (segment count, base64url, JSON)
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// A claim the validator requires is absent or empty
    #[error("required claim '{name}' is missing")]
    MissingClaim {
        /// Reserved claim name (`sub`, `exp`)
        name: &'static str,
    },

    /// Header algorithm is outside the configured allowlist
    #[error("token algorithm '{alg}' is not allowed")]
    AlgorithmNotAllowed {
        /// Algorithm name as carried in the token header
        alg: String,
    },

    /// Key id not resolvable even after a refresh attempt
    #[error("key id '{key_id}' not resolvable for issuer '{issuer}'")]
    UnknownKey {
        /// Issuer reference the lookup ran against
        issuer: String,
        /// Key id from the token header
        key_id: String,
    },

    /// Signature verification failed against the resolved key
    #[error("signature verification failed")]
    InvalidSignature,

    /// `exp` is in the past beyond the clock-skew tolerance
    #[error("token expired at {expired_at} (skew tolerance {leeway_secs}s)")]
    TokenExpired {
        /// `exp` claim value (seconds since Unix epoch)
        expired_at: u64,
        /// Clock-skew tolerance applied, in seconds
        leeway_secs: u64,
    },

    /// `nbf` is in the future beyond the clock-skew tolerance
    #[error("token not valid before {not_before} (skew tolerance {leeway_secs}s)")]
    TokenNotYetValid {
        /// `nbf` claim value (seconds since Unix epoch)
        not_before: u64,
        /// Clock-skew tolerance applied, in seconds
        leeway_secs: u64,
    },

    /// `iss` does not match the configured issuer while issuer validation is on
    #[error("issuer mismatch: expected '{expected}', token carries {found:?}")]
    IssuerMismatch {
        /// Issuer the policy requires
        expected: String,
        /// Issuer the token carried, if any
        found: Option<String>,
    },

    /// Configured audience is not a member of `aud` while audience validation is on
    #[error("audience mismatch: expected '{expected}', token carries {found:?}")]
    AudienceMismatch {
        /// Audience the policy requires
        expected: String,
        /// Audience values the token carried, if any
        found: Option<Vec<String>>,
    },

    /// Transient failure reaching the key discovery source
    #[error("key discovery unavailable for issuer '{issuer}': {reason}")]
    DiscoveryUnavailable {
        /// Issuer reference whose keys could not be fetched
        issuer: String,
        /// Underlying failure description
        reason: String,
    },

    /// Forwarding would push the chain past the configured maximum depth
    #[error("delegation depth {hops} exceeds configured maximum {max_hops}")]
    DelegationDepthExceeded {
        /// Hop count the forwarding attempt would produce
        hops: u32,
        /// Configured maximum hop count
        max_hops: u32,
    },
}

impl AuthError {
    /// Whether retrying the same operation can succeed.
    ///
    /// Only discovery failures are transient; validation failures are final
    /// for a given token and must not be retried locally.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::DiscoveryUnavailable { .. })
    }

    /// HTTP-equivalent status for surfacing this failure to a caller.
    pub fn status_hint(&self) -> u16 {
        match self {
            AuthError::MissingCredential
            | AuthError::MalformedToken(_)
            | AuthError::MissingClaim { .. }
            | AuthError::AlgorithmNotAllowed { .. }
            | AuthError::UnknownKey { .. }
            | AuthError::InvalidSignature
            | AuthError::TokenExpired { .. }
            | AuthError::TokenNotYetValid { .. } => 401,
            AuthError::IssuerMismatch { .. }
            | AuthError::AudienceMismatch { .. }
            | AuthError::DelegationDepthExceeded { .. } => 403,
            AuthError::DiscoveryUnavailable { .. } => 503,
        }
    }

    /// Error category for metrics and structured logging
    pub fn category(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::MissingClaim { .. } => "missing_claim",
            AuthError::AlgorithmNotAllowed { .. } => "algorithm_not_allowed",
            AuthError::UnknownKey { .. } => "unknown_key",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired { .. } => "token_expired",
            AuthError::TokenNotYetValid { .. } => "token_not_yet_valid",
            AuthError::IssuerMismatch { .. } => "issuer_mismatch",
            AuthError::AudienceMismatch { .. } => "audience_mismatch",
            AuthError::DiscoveryUnavailable { .. } => "discovery_unavailable",
            AuthError::DelegationDepthExceeded { .. } => "delegation_depth_exceeded",
        }
    }
}
