//! Compact token codec
//!
//! Splits a compact signed token into its header, claims, and signature
//! segments and parses the first two, without verifying anything. Signature
//! and claim-value checks live in the validation layer; keeping the codec
//! pure means a parse failure is always distinguishable from a trust
//! failure.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};

/// An opaque compact token as received from the wire.
///
/// Immutable once constructed; the delegation layer forwards it byte for
/// byte. `Debug` redacts the value so tokens do not leak into logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawToken(String);

impl RawToken {
    /// Wrap a compact token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The compact form, exactly as received
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RawToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for RawToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl std::fmt::Debug for RawToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RawToken").field(&"<redacted>").finish()
    }
}

/// Parsed token header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Signing algorithm name (`alg`)
    pub alg: String,
    /// Key id the signature was produced with (`kid`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Token type (`typ`), usually `JWT`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Decoded view of a token: parsed header and claims plus the pieces the
/// validator needs for signature verification
#[derive(Debug, Clone)]
pub struct DecodedToken {
    header: Header,
    claims: Claims,
    signature_b64: String,
    signing_input: String,
}

impl DecodedToken {
    /// Parsed header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Parsed claims
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Signature segment, still base64url encoded
    pub fn signature_b64(&self) -> &str {
        &self.signature_b64
    }

    /// The `header.claims` portion the signature covers
    pub fn signing_input(&self) -> &str {
        &self.signing_input
    }

    /// Take ownership of the claims
    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

/// Decode a compact token into header, claims, and signature.
///
/// # Errors
///
/// [`AuthError::MalformedToken`] when the string does not split into exactly
/// three non-empty segments, any segment is not valid base64url, or the
/// header/claims segments are not the expected JSON documents.
pub fn decode(raw: &RawToken) -> AuthResult<DecodedToken> {
    let parts: Vec<&str> = raw.as_str().split('.').collect();
    let &[header_b64, claims_b64, signature_b64] = parts.as_slice() else {
        return Err(AuthError::MalformedToken(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    };
    if header_b64.is_empty() || claims_b64.is_empty() || signature_b64.is_empty() {
        return Err(AuthError::MalformedToken("empty segment".to_string()));
    }

    let header_bytes = decode_segment(header_b64, "header")?;
    let header: Header = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::MalformedToken(format!("header is not a valid JSON header: {e}")))?;

    let claims_bytes = decode_segment(claims_b64, "claims")?;
    let claims: Claims = serde_json::from_slice(&claims_bytes)
        .map_err(|e| AuthError::MalformedToken(format!("claims segment is not a JSON object: {e}")))?;

    decode_segment(signature_b64, "signature")?;

    Ok(DecodedToken {
        header,
        claims,
        signature_b64: signature_b64.to_string(),
        signing_input: format!("{header_b64}.{claims_b64}"),
    })
}

/// Re-encode claims into a base64url segment.
///
/// Claim order is preserved from the decoded token, so a decode/encode
/// round trip reproduces the original claims segment byte for byte.
///
/// # Errors
///
/// [`AuthError::MalformedToken`] when the claims cannot be serialized.
pub fn encode_claims(claims: &Claims) -> AuthResult<String> {
    let bytes = serde_json::to_vec(claims)
        .map_err(|e| AuthError::MalformedToken(format!("claims not serializable: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Re-encode a header into a base64url segment.
///
/// # Errors
///
/// [`AuthError::MalformedToken`] when the header cannot be serialized.
pub fn encode_header(header: &Header) -> AuthResult<String> {
    let bytes = serde_json::to_vec(header)
        .map_err(|e| AuthError::MalformedToken(format!("header not serializable: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn decode_segment(segment: &str, name: &str) -> AuthResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::MalformedToken(format!("{name} segment is not base64url: {e}")))
}
