//! Deployment configuration
//!
//! One [`AuthConfig`] document per service instance, deserialized at
//! startup and immutable thereafter. `max_delegation_hops` has no default
//! on purpose: the chain-depth ceiling is an explicit deployment decision.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::authenticator::Authenticator;
use crate::delegation::{DelegationForwarder, DelegationPolicy};
use crate::keys::{DiscoverySource, KeyCacheConfig, KeyResolver};
use crate::normalize::ProviderProfile;
use crate::policy::ValidationPolicy;
use crate::validator::TokenValidator;

/// Service-instance configuration for validation and delegation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token validation policy
    pub policy: ValidationPolicy,
    /// Key cache behavior
    #[serde(default)]
    pub key_cache: KeyCacheConfig,
    /// Maximum delegation hops; required, no implicit unlimited mode
    pub max_delegation_hops: u32,
    /// Claim layout per issuer
    #[serde(default)]
    pub profiles: HashMap<String, ProviderProfile>,
}

impl AuthConfig {
    /// Minimal configuration over a key source and an explicit hop ceiling
    pub fn new(policy: ValidationPolicy, max_delegation_hops: u32) -> Self {
        Self {
            policy,
            key_cache: KeyCacheConfig::default(),
            max_delegation_hops,
            profiles: HashMap::new(),
        }
    }

    /// The delegation policy this configuration prescribes
    pub fn delegation_policy(&self) -> DelegationPolicy {
        DelegationPolicy::new(self.max_delegation_hops)
    }

    /// Build the request-path components over a discovery source.
    ///
    /// The resolver, validator, and profile table are wired exactly as the
    /// configuration describes; the forwarder enforces the configured hop
    /// ceiling.
    pub fn build(&self, source: Arc<dyn DiscoverySource>) -> (Authenticator, DelegationForwarder) {
        let resolver = Arc::new(KeyResolver::with_config(source, self.key_cache.clone()));
        let validator = Arc::new(TokenValidator::new(self.policy.clone(), resolver));

        let mut authenticator = Authenticator::new(validator);
        for (issuer, profile) in &self.profiles {
            authenticator = authenticator.with_profile(issuer.clone(), profile.clone());
        }

        (
            authenticator,
            DelegationForwarder::new(self.delegation_policy()),
        )
    }
}
