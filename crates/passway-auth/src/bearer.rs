//! Bearer credential extraction
//!
//! Pulling the token and the hop count off an inbound request's headers.
//! Absence of the authorization header, or a scheme other than `Bearer`, is
//! [`AuthError::MissingCredential`] - distinct from every validation
//! failure so callers can answer "no credential" and "bad credential"
//! differently.

use http::HeaderMap;
use http::header::AUTHORIZATION;

use passway_core::{AuthError, AuthResult, RawToken};

use crate::delegation::{DelegationContext, HOP_COUNT_HEADER};

/// Extract the bearer token from an authorization header.
///
/// # Errors
///
/// [`AuthError::MissingCredential`] when the header is absent, unreadable,
/// uses a non-`Bearer` scheme, or carries an empty credential.
pub fn bearer_token(headers: &HeaderMap) -> AuthResult<RawToken> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    let value = value.to_str().map_err(|_| AuthError::MissingCredential)?;
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingCredential)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingCredential);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(RawToken::new(token))
}

/// Read the delegation hop count; an absent header means this service is
/// the first hop.
///
/// # Errors
///
/// [`AuthError::MalformedToken`] when the header is present but not a
/// non-negative integer.
pub fn hop_count(headers: &HeaderMap) -> AuthResult<u32> {
    match headers.get(HOP_COUNT_HEADER) {
        None => Ok(0),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(|| {
                AuthError::MalformedToken(format!(
                    "invalid {} header",
                    HOP_COUNT_HEADER.as_str()
                ))
            }),
    }
}

/// Build the per-request [`DelegationContext`] from inbound headers.
///
/// # Errors
///
/// Propagates [`bearer_token`] and [`hop_count`] failures.
pub fn delegation_context(headers: &HeaderMap) -> AuthResult<DelegationContext> {
    let token = bearer_token(headers)?;
    let hops = hop_count(headers)?;
    Ok(DelegationContext::with_hops(token, hops))
}
