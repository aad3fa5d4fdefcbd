//! Key resolution with per-issuer caching
//!
//! [`KeyResolver`] owns the only mutable shared state in the stack: a cache
//! of [`KeySet`]s keyed by issuer. Lookups are read-mostly; a cache miss
//! takes a per-issuer refresh lock so a concurrent burst of requests for a
//! freshly rotated key id produces exactly one discovery fetch. A key id
//! that stays unknown after a refresh is negative-cached for a window, so
//! rotation events and probes for bogus key ids cannot hammer the discovery
//! endpoint.
//!
//! Discovery itself is behind the [`DiscoverySource`] trait; the production
//! implementation is [`HttpDiscoverySource`], and [`StaticDiscovery`] serves
//! fixtures and deployments with pre-distributed keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use url::Url;

use passway_core::{AuthError, AuthResult};

use crate::policy::serde_secs;

/// Verification key material for one issuer, keyed by key id
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, Jwk>,
}

impl KeySet {
    /// Empty key set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JWKS document, skipping keys that carry no key id
    pub fn from_jwks(jwks: JwkSet) -> Self {
        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            match jwk.common.key_id.clone() {
                Some(kid) => {
                    keys.insert(kid, jwk);
                }
                None => warn!("discovery returned a key without a kid, skipping"),
            }
        }
        Self { keys }
    }

    /// Insert or replace a key
    pub fn insert(&mut self, key_id: impl Into<String>, jwk: Jwk) {
        self.keys.insert(key_id.into(), jwk);
    }

    /// Key material for a key id
    pub fn find(&self, key_id: &str) -> Option<&Jwk> {
        self.keys.get(key_id)
    }

    /// Key ids currently present
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Source of published verification keys for an issuer.
///
/// Models the authorization server's key endpoint. Failures are
/// [`AuthError::DiscoveryUnavailable`], the one retryable kind in the
/// taxonomy.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Fetch the current key set for an issuer.
    ///
    /// # Errors
    ///
    /// [`AuthError::DiscoveryUnavailable`] when the source cannot be
    /// reached or returns an unusable document.
    async fn fetch_keys(&self, issuer: &str) -> AuthResult<KeySet>;
}

/// In-memory discovery source.
///
/// Serves fixtures in tests and deployments where key material is
/// distributed out of band instead of fetched.
#[derive(Debug, Default)]
pub struct StaticDiscovery {
    sets: RwLock<HashMap<String, KeySet>>,
}

impl StaticDiscovery {
    /// Empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the key set for an issuer
    pub async fn set_keys(&self, issuer: impl Into<String>, keys: KeySet) {
        self.sets.write().await.insert(issuer.into(), keys);
    }
}

#[async_trait]
impl DiscoverySource for StaticDiscovery {
    async fn fetch_keys(&self, issuer: &str) -> AuthResult<KeySet> {
        self.sets
            .read()
            .await
            .get(issuer)
            .cloned()
            .ok_or_else(|| AuthError::DiscoveryUnavailable {
                issuer: issuer.to_string(),
                reason: "issuer not configured".to_string(),
            })
    }
}

/// HTTP discovery source fetching JWKS documents over `reqwest`.
///
/// The endpoint defaults to `{issuer}/.well-known/jwks.json` and can be
/// overridden per issuer. Endpoints must use HTTPS; plain HTTP is accepted
/// for loopback only.
#[derive(Debug, Clone)]
pub struct HttpDiscoverySource {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl HttpDiscoverySource {
    /// Source with a 10 second request timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }

    /// Source with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
            endpoints: HashMap::new(),
        }
    }

    /// Override the JWKS endpoint for an issuer
    pub fn with_endpoint(mut self, issuer: impl Into<String>, jwks_url: impl Into<String>) -> Self {
        self.endpoints.insert(issuer.into(), jwks_url.into());
        self
    }

    fn jwks_url(&self, issuer: &str) -> String {
        self.endpoints.get(issuer).cloned().unwrap_or_else(|| {
            format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
        })
    }

    fn check_endpoint(issuer: &str, jwks_url: &str) -> AuthResult<()> {
        let parsed = Url::parse(jwks_url).map_err(|e| AuthError::DiscoveryUnavailable {
            issuer: issuer.to_string(),
            reason: format!("invalid JWKS endpoint '{jwks_url}': {e}"),
        })?;
        let loopback = matches!(parsed.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
        if parsed.scheme() != "https" && !loopback {
            return Err(AuthError::DiscoveryUnavailable {
                issuer: issuer.to_string(),
                reason: "JWKS endpoint must use HTTPS (HTTP only allowed for loopback)"
                    .to_string(),
            });
        }
        Ok(())
    }
}

impl Default for HttpDiscoverySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiscoverySource for HttpDiscoverySource {
    async fn fetch_keys(&self, issuer: &str) -> AuthResult<KeySet> {
        let jwks_url = self.jwks_url(issuer);
        Self::check_endpoint(issuer, &jwks_url)?;

        info!(issuer, jwks_url = %jwks_url, "fetching key set");
        let response = self.client.get(&jwks_url).send().await.map_err(|e| {
            warn!(issuer, jwks_url = %jwks_url, error = %e, "key set fetch failed");
            AuthError::DiscoveryUnavailable {
                issuer: issuer.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            warn!(
                issuer,
                jwks_url = %jwks_url,
                status = %response.status(),
                "key endpoint returned error status"
            );
            return Err(AuthError::DiscoveryUnavailable {
                issuer: issuer.to_string(),
                reason: format!("key endpoint returned status {}", response.status()),
            });
        }

        let jwks: JwkSet = response.json().await.map_err(|e| AuthError::DiscoveryUnavailable {
            issuer: issuer.to_string(),
            reason: format!("invalid JWKS document: {e}"),
        })?;

        let keys = KeySet::from_jwks(jwks);
        info!(issuer, key_count = keys.len(), "fetched key set");
        Ok(keys)
    }
}

/// Cache behavior for [`KeyResolver`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCacheConfig {
    /// How long a fetched key set counts as fresh
    #[serde(default = "default_ttl", with = "serde_secs")]
    pub ttl: Duration,
    /// How long past the TTL a stale set may still be served when the
    /// discovery source is unavailable
    #[serde(default = "default_stale_grace", with = "serde_secs")]
    pub stale_grace: Duration,
    /// Window during which a key id that stayed unknown after a refresh is
    /// not refreshed for again
    #[serde(default = "default_negative_ttl", with = "serde_secs")]
    pub negative_ttl: Duration,
    /// Upper bound on a single discovery fetch
    #[serde(default = "default_fetch_timeout", with = "serde_secs")]
    pub fetch_timeout: Duration,
    /// Additional fetch attempts after a transient failure
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    /// Delay before the first retry; doubles per attempt
    #[serde(default = "default_retry_backoff", with = "serde_millis")]
    pub retry_backoff: Duration,
}

fn default_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_stale_grace() -> Duration {
    Duration::from_secs(300)
}

fn default_negative_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_retry_backoff() -> Duration {
    Duration::from_millis(100)
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            stale_grace: default_stale_grace(),
            negative_ttl: default_negative_ttl(),
            fetch_timeout: default_fetch_timeout(),
            fetch_retries: default_fetch_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

/// Serde adapter for durations expressed as whole milliseconds
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[derive(Debug)]
struct CachedKeys {
    keys: KeySet,
    fetched_at: Instant,
}

impl CachedKeys {
    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

#[derive(Debug, Default)]
struct IssuerEntry {
    current: RwLock<Option<CachedKeys>>,
    refresh: Mutex<()>,
    missing: Mutex<HashMap<String, Instant>>,
}

/// Per-issuer caching resolver from key id to verification key
pub struct KeyResolver {
    source: Arc<dyn DiscoverySource>,
    config: KeyCacheConfig,
    issuers: RwLock<HashMap<String, Arc<IssuerEntry>>>,
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KeyResolver {
    /// Resolver over a discovery source with default cache behavior
    pub fn new(source: Arc<dyn DiscoverySource>) -> Self {
        Self::with_config(source, KeyCacheConfig::default())
    }

    /// Resolver with explicit cache behavior
    pub fn with_config(source: Arc<dyn DiscoverySource>, config: KeyCacheConfig) -> Self {
        Self {
            source,
            config,
            issuers: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a verification key for `key_id` as published by `issuer`.
    ///
    /// Serves from cache when fresh; otherwise refreshes, coalescing
    /// concurrent misses for the same issuer into one fetch. On
    /// [`AuthError::DiscoveryUnavailable`] the last-known-good set is served
    /// while within the stale grace period.
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownKey`] when the key id stays absent after a
    /// refresh; [`AuthError::DiscoveryUnavailable`] when discovery fails and
    /// no usable cached set remains.
    pub async fn resolve(&self, issuer: &str, key_id: &str) -> AuthResult<DecodingKey> {
        let entry = self.entry(issuer).await;

        {
            let current = entry.current.read().await;
            if let Some(cached) = current.as_ref()
                && cached.age() < self.config.ttl
                && let Some(jwk) = cached.keys.find(key_id)
            {
                debug!(issuer, key_id, "key cache hit");
                return decoding_key(issuer, key_id, jwk);
            }
        }

        let _refresh_guard = entry.refresh.lock().await;

        // Double-checked read: a concurrent miss may have refreshed while we
        // waited on the lock.
        {
            let current = entry.current.read().await;
            if let Some(cached) = current.as_ref()
                && cached.age() < self.config.ttl
                && let Some(jwk) = cached.keys.find(key_id)
            {
                debug!(issuer, key_id, "key cache hit after coalesced refresh");
                return decoding_key(issuer, key_id, jwk);
            }
        }

        {
            let mut missing = entry.missing.lock().await;
            missing.retain(|_, recorded_at| recorded_at.elapsed() < self.config.negative_ttl);
            if missing.contains_key(key_id) {
                debug!(issuer, key_id, "key id negative-cached, skipping refresh");
                return Err(AuthError::UnknownKey {
                    issuer: issuer.to_string(),
                    key_id: key_id.to_string(),
                });
            }
        }

        match self.fetch_with_retry(issuer).await {
            Ok(keys) => {
                let found = keys.find(key_id).cloned();
                *entry.current.write().await = Some(CachedKeys {
                    keys,
                    fetched_at: Instant::now(),
                });
                match found {
                    Some(jwk) => decoding_key(issuer, key_id, &jwk),
                    None => {
                        warn!(issuer, key_id, "key id still absent after refresh");
                        entry
                            .missing
                            .lock()
                            .await
                            .insert(key_id.to_string(), Instant::now());
                        Err(AuthError::UnknownKey {
                            issuer: issuer.to_string(),
                            key_id: key_id.to_string(),
                        })
                    }
                }
            }
            Err(err) => {
                let current = entry.current.read().await;
                if let Some(cached) = current.as_ref()
                    && cached.age() < self.config.ttl + self.config.stale_grace
                {
                    if let Some(jwk) = cached.keys.find(key_id) {
                        warn!(
                            issuer,
                            key_id,
                            error = %err,
                            "discovery unavailable, serving last-known-good key set"
                        );
                        return decoding_key(issuer, key_id, jwk);
                    }
                }
                Err(err)
            }
        }
    }

    /// Force-refresh the key set for an issuer.
    ///
    /// # Errors
    ///
    /// [`AuthError::DiscoveryUnavailable`] when every fetch attempt fails.
    pub async fn refresh(&self, issuer: &str) -> AuthResult<()> {
        let entry = self.entry(issuer).await;
        let _refresh_guard = entry.refresh.lock().await;
        let keys = self.fetch_with_retry(issuer).await?;
        info!(issuer, key_count = keys.len(), "key set refreshed");
        *entry.current.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    /// Spawn a best-effort periodic refresh for one issuer.
    ///
    /// Failures are logged and the next tick tries again; request-path
    /// validation keeps serving whatever the cache holds.
    pub fn spawn_refresh_task(
        self: &Arc<Self>,
        issuer: impl Into<String>,
        period: Duration,
    ) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        let issuer = issuer.into();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = resolver.refresh(&issuer).await {
                    warn!(issuer = %issuer, error = %err, "background key refresh failed");
                }
            }
        })
    }

    async fn entry(&self, issuer: &str) -> Arc<IssuerEntry> {
        {
            let issuers = self.issuers.read().await;
            if let Some(entry) = issuers.get(issuer) {
                return Arc::clone(entry);
            }
        }
        let mut issuers = self.issuers.write().await;
        Arc::clone(issuers.entry(issuer.to_string()).or_default())
    }

    async fn fetch_with_retry(&self, issuer: &str) -> AuthResult<KeySet> {
        let attempts = self.config.fetch_retries.saturating_add(1);
        let mut delay = self.config.retry_backoff;
        let mut last_err = AuthError::DiscoveryUnavailable {
            issuer: issuer.to_string(),
            reason: "no fetch attempted".to_string(),
        };

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            match tokio::time::timeout(self.config.fetch_timeout, self.source.fetch_keys(issuer))
                .await
            {
                Ok(Ok(keys)) => return Ok(keys),
                Ok(Err(err)) => {
                    if !err.is_transient() {
                        return Err(err);
                    }
                    warn!(issuer, attempt, error = %err, "discovery fetch failed");
                    last_err = err;
                }
                Err(_) => {
                    warn!(issuer, attempt, "discovery fetch timed out");
                    last_err = AuthError::DiscoveryUnavailable {
                        issuer: issuer.to_string(),
                        reason: format!(
                            "fetch timed out after {}ms",
                            self.config.fetch_timeout.as_millis()
                        ),
                    };
                }
            }
        }
        Err(last_err)
    }
}

fn decoding_key(issuer: &str, key_id: &str, jwk: &Jwk) -> AuthResult<DecodingKey> {
    DecodingKey::from_jwk(jwk).map_err(|e| {
        error!(issuer, key_id, error = %e, "unusable key material in key set");
        AuthError::UnknownKey {
            issuer: issuer.to_string(),
            key_id: key_id.to_string(),
        }
    })
}
