//! Request authentication facade
//!
//! [`Authenticator`] wires the per-request pipeline together: bearer
//! extraction, validation, and normalization. The profile table picks a
//! [`ProviderProfile`] by the token's issuer, so one service can accept
//! tokens from several providers with different claim layouts.

use std::collections::HashMap;
use std::sync::Arc;

use http::HeaderMap;
use tracing::debug;

use passway_core::{AuthResult, Claims};

use crate::bearer;
use crate::delegation::DelegationContext;
use crate::normalize::{Identity, ProviderProfile, normalize};
use crate::validator::TokenValidator;

/// Everything request-handling logic needs after authentication
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    /// Canonical identity of the caller
    pub identity: Identity,
    /// Full validated claim set
    pub claims: Claims,
    /// Context to hand to [`crate::delegation::DelegationForwarder`] when
    /// calling downstream
    pub delegation: DelegationContext,
}

/// Extraction, validation, and normalization behind one entry point.
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use http::HeaderMap;
/// # use passway_auth::authenticator::Authenticator;
/// # use passway_auth::keys::{KeyResolver, StaticDiscovery};
/// # use passway_auth::normalize::ProviderProfile;
/// # use passway_auth::policy::ValidationPolicy;
/// # use passway_auth::validator::TokenValidator;
/// # tokio_test::block_on(async {
/// let resolver = Arc::new(KeyResolver::new(Arc::new(StaticDiscovery::new())));
/// let validator = Arc::new(TokenValidator::new(
///     ValidationPolicy::new("https://auth.example.com"),
///     resolver,
/// ));
/// let authenticator = Authenticator::new(validator).with_profile(
///     "https://legacy-idp.example.com",
///     ProviderProfile::standard().with_email_claim("name"),
/// );
///
/// # let headers = HeaderMap::new();
/// let outcome = authenticator.authenticate(&headers).await?;
/// println!("caller: {}", outcome.identity.subject);
/// # Ok::<(), passway_core::AuthError>(())
/// # });
/// ```
pub struct Authenticator {
    validator: Arc<TokenValidator>,
    profiles: HashMap<String, ProviderProfile>,
    default_profile: ProviderProfile,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("profiles", &self.profiles.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Authenticator with the standard claim layout for every issuer
    pub fn new(validator: Arc<TokenValidator>) -> Self {
        Self {
            validator,
            profiles: HashMap::new(),
            default_profile: ProviderProfile::standard(),
        }
    }

    /// Register a claim layout for one issuer
    pub fn with_profile(mut self, issuer: impl Into<String>, profile: ProviderProfile) -> Self {
        self.profiles.insert(issuer.into(), profile);
        self
    }

    /// Replace the layout used for issuers without a registered profile
    pub fn with_default_profile(mut self, profile: ProviderProfile) -> Self {
        self.default_profile = profile;
        self
    }

    /// The wrapped validator
    pub fn validator(&self) -> &Arc<TokenValidator> {
        &self.validator
    }

    /// Authenticate an inbound request from its headers.
    ///
    /// # Errors
    ///
    /// Any [`passway_core::AuthError`] from extraction or validation; no
    /// partial identity is ever produced.
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthResult<AuthOutcome> {
        let delegation = bearer::delegation_context(headers)?;
        let validated = self.validator.validate(delegation.token()).await?;

        let profile = validated
            .claims()
            .iss()
            .and_then(|iss| self.profiles.get(iss))
            .unwrap_or(&self.default_profile);
        let identity = normalize(validated.claims(), profile);

        debug!(
            subject = %identity.subject,
            hops = delegation.hops(),
            "request authenticated"
        );

        let (_, claims) = validated.into_parts();
        Ok(AuthOutcome {
            identity,
            claims,
            delegation,
        })
    }
}
