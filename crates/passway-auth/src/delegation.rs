//! Delegation across service hops
//!
//! A service that calls a further downstream service on behalf of the
//! original caller reuses the inbound token unchanged. The chain depth is
//! carried out of band in the [`HOP_COUNT_HEADER`] request header, since
//! the token itself is opaque and never rewritten. [`DelegationForwarder`]
//! attaches the credential and enforces the maximum depth; exceeding it is
//! an architectural violation, not a transient fault.

use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use passway_core::{AuthError, AuthResult, RawToken};

/// Request header carrying the number of delegation hops already taken
pub const HOP_COUNT_HEADER: HeaderName = HeaderName::from_static("x-passway-hops");

/// The inbound token plus the chain position of the current service.
///
/// Created per inbound request, handed explicitly to anything that forwards
/// the credential, discarded at request end.
#[derive(Debug, Clone)]
pub struct DelegationContext {
    token: RawToken,
    hops: u32,
}

impl DelegationContext {
    /// Context for a first-hop request (no upstream service forwarded it)
    pub fn new(token: RawToken) -> Self {
        Self { token, hops: 0 }
    }

    /// Context at a known chain position
    pub fn with_hops(token: RawToken, hops: u32) -> Self {
        Self { token, hops }
    }

    /// The compact token carried by the request
    pub fn token(&self) -> &RawToken {
        &self.token
    }

    /// Delegation hops already taken to reach this service
    pub fn hops(&self) -> u32 {
        self.hops
    }
}

/// Chain-depth policy.
///
/// The maximum is a deployment decision and must be chosen explicitly;
/// there is deliberately no `Default`. One level of delegation
/// (`max_hops = 1`) is the recommended ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationPolicy {
    max_hops: u32,
}

impl DelegationPolicy {
    /// Policy allowing at most `max_hops` forwarding hops
    pub fn new(max_hops: u32) -> Self {
        Self { max_hops }
    }

    /// Configured maximum hop count
    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }
}

/// Attaches delegated credentials to outbound requests
#[derive(Debug, Clone)]
pub struct DelegationForwarder {
    policy: DelegationPolicy,
}

impl DelegationForwarder {
    /// Forwarder enforcing the given depth policy
    pub fn new(policy: DelegationPolicy) -> Self {
        Self { policy }
    }

    /// The configured depth policy
    pub fn policy(&self) -> DelegationPolicy {
        self.policy
    }

    /// Check that the current chain position is within the maximum.
    ///
    /// # Errors
    ///
    /// [`AuthError::DelegationDepthExceeded`] when the hop count is already
    /// over the configured maximum.
    pub fn check_depth(&self, context: &DelegationContext) -> AuthResult<()> {
        if context.hops > self.policy.max_hops {
            error!(
                hops = context.hops,
                max_hops = self.policy.max_hops,
                "delegation depth exceeded"
            );
            return Err(AuthError::DelegationDepthExceeded {
                hops: context.hops,
                max_hops: self.policy.max_hops,
            });
        }
        Ok(())
    }

    /// Attach the bearer credential and the incremented hop count to an
    /// outbound request's headers.
    ///
    /// Pure and synchronous; the outbound call itself is the caller's
    /// collaborator.
    ///
    /// # Errors
    ///
    /// [`AuthError::DelegationDepthExceeded`] when forwarding would push the
    /// chain past the configured maximum;
    /// [`AuthError::MalformedToken`] when the token cannot be carried in a
    /// header.
    pub fn attach(&self, headers: &mut HeaderMap, context: &DelegationContext) -> AuthResult<()> {
        let outbound_hops = context.hops.saturating_add(1);
        if outbound_hops > self.policy.max_hops {
            error!(
                hops = outbound_hops,
                max_hops = self.policy.max_hops,
                "refusing to forward token beyond configured delegation depth"
            );
            return Err(AuthError::DelegationDepthExceeded {
                hops: outbound_hops,
                max_hops: self.policy.max_hops,
            });
        }

        let mut credential =
            HeaderValue::from_str(&format!("Bearer {}", context.token.as_str())).map_err(|_| {
                AuthError::MalformedToken("token contains bytes not valid in a header".to_string())
            })?;
        credential.set_sensitive(true);

        headers.insert(AUTHORIZATION, credential);
        headers.insert(HOP_COUNT_HEADER, HeaderValue::from(outbound_hops));
        debug!(hops = outbound_hops, "attached delegated bearer credential");
        Ok(())
    }
}
