//! Shared fixtures: token minting, key sets, and instrumented discovery
//! sources.
//!
//! Tokens are HS256-signed with an `oct` JWK so the suite is fully
//! self-contained; policies under test override the algorithm allowlist
//! accordingly.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use passway_auth::keys::{DiscoverySource, KeyResolver, KeySet, StaticDiscovery};
use passway_auth::policy::ValidationPolicy;
use passway_auth::validator::TokenValidator;
use passway_core::{AuthError, AuthResult, RawToken};

pub const ISSUER: &str = "https://auth.example.com";
pub const KEY_ID: &str = "test-key-1";
pub const SECRET: &[u8] = b"shared-test-secret-at-least-32-bytes!!";

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
}

pub fn oct_jwk(kid: &str) -> Jwk {
    serde_json::from_value(json!({
        "kty": "oct",
        "kid": kid,
        "k": URL_SAFE_NO_PAD.encode(SECRET),
    }))
    .expect("oct jwk")
}

pub fn jwks_document(kids: &[&str]) -> Value {
    json!({
        "keys": kids
            .iter()
            .map(|kid| json!({
                "kty": "oct",
                "kid": kid,
                "k": URL_SAFE_NO_PAD.encode(SECRET),
            }))
            .collect::<Vec<_>>()
    })
}

pub fn key_set(kids: &[&str]) -> KeySet {
    let mut keys = KeySet::new();
    for kid in kids {
        keys.insert(*kid, oct_jwk(kid));
    }
    keys
}

/// Mint an HS256 token with the shared secret
pub fn mint(kid: &str, claims: &Value) -> RawToken {
    mint_with_algorithm(kid, claims, Algorithm::HS256)
}

pub fn mint_with_algorithm(kid: &str, claims: &Value, algorithm: Algorithm) -> RawToken {
    let mut header = Header::new(algorithm);
    header.kid = Some(kid.to_string());
    RawToken::new(
        encode(&header, claims, &EncodingKey::from_secret(SECRET)).expect("token encodes"),
    )
}

/// A fresh, fully populated claim set that satisfies a strict policy
pub fn standard_claims() -> Value {
    json!({
        "iss": ISSUER,
        "sub": "user-42",
        "aud": "svc-a",
        "exp": unix_now() + 3600,
        "name": "Alice Example",
        "email": "alice@example.com",
    })
}

/// Policy accepting the HS256 fixtures, both checks disabled
pub fn hs256_policy() -> ValidationPolicy {
    ValidationPolicy::new(ISSUER).with_algorithms(vec![Algorithm::HS256])
}

pub async fn static_source(kids: &[&str]) -> Arc<StaticDiscovery> {
    let source = StaticDiscovery::new();
    source.set_keys(ISSUER, key_set(kids)).await;
    Arc::new(source)
}

pub async fn hs256_validator(kids: &[&str]) -> TokenValidator {
    TokenValidator::new(
        hs256_policy(),
        Arc::new(KeyResolver::new(static_source(kids).await)),
    )
}

/// Discovery source that counts fetches and can slow them down, for
/// coalescing and timeout assertions
pub struct CountingDiscovery {
    inner: StaticDiscovery,
    fetches: AtomicUsize,
    delay: Duration,
}

impl CountingDiscovery {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: StaticDiscovery::new(),
            fetches: AtomicUsize::new(0),
            delay,
        }
    }

    pub async fn set_keys(&self, issuer: &str, keys: KeySet) {
        self.inner.set_keys(issuer, keys).await;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoverySource for CountingDiscovery {
    async fn fetch_keys(&self, issuer: &str) -> AuthResult<KeySet> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.fetch_keys(issuer).await
    }
}

/// Discovery source that replays a scripted sequence of outcomes, for
/// stale-grace and fail-closed assertions
pub struct SequenceDiscovery {
    responses: Mutex<VecDeque<AuthResult<KeySet>>>,
}

impl SequenceDiscovery {
    pub fn new(responses: Vec<AuthResult<KeySet>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl DiscoverySource for SequenceDiscovery {
    async fn fetch_keys(&self, issuer: &str) -> AuthResult<KeySet> {
        self.responses.lock().await.pop_front().unwrap_or_else(|| {
            Err(AuthError::DiscoveryUnavailable {
                issuer: issuer.to_string(),
                reason: "scripted responses exhausted".to_string(),
            })
        })
    }
}
