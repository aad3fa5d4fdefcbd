//! Key cache and rotation robustness tests
//!
//! Covers the caching contract of `KeyResolver`: coalesced refreshes under
//! concurrent misses, negative caching of unknown key ids, stale-grace
//! serving during discovery outages, bounded fetch timeouts, and the HTTP
//! discovery source against a mock key endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    CountingDiscovery, ISSUER, KEY_ID, SequenceDiscovery, hs256_policy, jwks_document, key_set,
    mint, standard_claims,
};
use passway_auth::keys::{HttpDiscoverySource, KeyCacheConfig, KeyResolver};
use passway_auth::validator::TokenValidator;
use passway_core::AuthError;

fn fast_cache() -> KeyCacheConfig {
    KeyCacheConfig {
        ttl: Duration::from_millis(50),
        stale_grace: Duration::from_secs(10),
        negative_ttl: Duration::from_secs(10),
        fetch_timeout: Duration::from_secs(5),
        fetch_retries: 0,
        retry_backoff: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_concurrent_misses_coalesce_into_one_fetch() {
    let source = Arc::new(CountingDiscovery::new(Duration::from_millis(50)));
    source.set_keys(ISSUER, key_set(&[KEY_ID])).await;
    let resolver = Arc::new(KeyResolver::new(source.clone()));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let resolver = Arc::clone(&resolver);
        tasks.push(tokio::spawn(async move {
            resolver.resolve(ISSUER, KEY_ID).await
        }));
    }
    for task in tasks {
        task.await.expect("task completes").expect("key resolves");
    }

    assert_eq!(source.fetches(), 1, "burst must produce exactly one fetch");
}

#[tokio::test]
async fn test_rotated_key_found_after_refresh() {
    let source = Arc::new(CountingDiscovery::new(Duration::ZERO));
    source.set_keys(ISSUER, key_set(&["key-old"])).await;
    let resolver = KeyResolver::new(source.clone());

    resolver.resolve(ISSUER, "key-old").await.expect("initial key");
    assert_eq!(source.fetches(), 1);

    // Rotation publishes a new key id; the fresh-but-missing kid forces a
    // refresh even though the cached set has not expired.
    source.set_keys(ISSUER, key_set(&["key-old", "key-new"])).await;
    resolver.resolve(ISSUER, "key-new").await.expect("rotated key");
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn test_unknown_key_id_negative_cached_per_window() {
    let source = Arc::new(CountingDiscovery::new(Duration::ZERO));
    source.set_keys(ISSUER, key_set(&[KEY_ID])).await;
    let resolver = KeyResolver::new(source.clone());

    for _ in 0..3 {
        let err = resolver.resolve(ISSUER, "ghost-key").await.expect_err("unknown");
        assert!(matches!(err, AuthError::UnknownKey { .. }), "{err}");
    }

    assert_eq!(
        source.fetches(),
        1,
        "one refresh attempt per unknown key id per window"
    );
}

#[tokio::test]
async fn test_stale_keys_served_within_grace_on_outage() {
    let source = Arc::new(SequenceDiscovery::new(vec![
        Ok(key_set(&[KEY_ID])),
        Err(AuthError::DiscoveryUnavailable {
            issuer: ISSUER.to_string(),
            reason: "connection refused".to_string(),
        }),
    ]));
    let resolver = KeyResolver::with_config(source, fast_cache());

    resolver.resolve(ISSUER, KEY_ID).await.expect("initial fetch");
    tokio::time::sleep(Duration::from_millis(80)).await;

    // TTL has lapsed, the refresh fails, and the last-known-good set is
    // still inside the grace period.
    resolver
        .resolve(ISSUER, KEY_ID)
        .await
        .expect("stale set served during outage");
}

#[tokio::test]
async fn test_outage_beyond_grace_fails_closed() {
    let source = Arc::new(SequenceDiscovery::new(vec![
        Ok(key_set(&[KEY_ID])),
        Err(AuthError::DiscoveryUnavailable {
            issuer: ISSUER.to_string(),
            reason: "connection refused".to_string(),
        }),
    ]));
    let config = KeyCacheConfig {
        stale_grace: Duration::ZERO,
        ..fast_cache()
    };
    let resolver = KeyResolver::with_config(source, config);

    resolver.resolve(ISSUER, KEY_ID).await.expect("initial fetch");
    tokio::time::sleep(Duration::from_millis(80)).await;

    let err = resolver.resolve(ISSUER, KEY_ID).await.expect_err("fail closed");
    assert!(err.is_transient(), "{err}");
    assert_eq!(err.status_hint(), 503);
}

#[tokio::test]
async fn test_transient_failures_retried_with_backoff() {
    let source = Arc::new(SequenceDiscovery::new(vec![
        Err(AuthError::DiscoveryUnavailable {
            issuer: ISSUER.to_string(),
            reason: "connection reset".to_string(),
        }),
        Ok(key_set(&[KEY_ID])),
    ]));
    let config = KeyCacheConfig {
        fetch_retries: 2,
        ..fast_cache()
    };
    let resolver = KeyResolver::with_config(source, config);

    resolver
        .resolve(ISSUER, KEY_ID)
        .await
        .expect("second attempt succeeds");
}

#[tokio::test]
async fn test_slow_discovery_bounded_by_timeout() {
    let source = Arc::new(CountingDiscovery::new(Duration::from_secs(5)));
    source.set_keys(ISSUER, key_set(&[KEY_ID])).await;
    let config = KeyCacheConfig {
        fetch_timeout: Duration::from_millis(50),
        ..fast_cache()
    };
    let resolver = KeyResolver::with_config(source, config);

    let err = resolver.resolve(ISSUER, KEY_ID).await.expect_err("times out");
    match err {
        AuthError::DiscoveryUnavailable { reason, .. } => {
            assert!(reason.contains("timed out"), "{reason}");
        }
        other => panic!("expected DiscoveryUnavailable, got {other}"),
    }
}

#[tokio::test]
async fn test_background_refresh_keeps_cache_warm() {
    let source = Arc::new(CountingDiscovery::new(Duration::ZERO));
    source.set_keys(ISSUER, key_set(&[KEY_ID])).await;
    let resolver = Arc::new(KeyResolver::new(source.clone()));

    let task = resolver.spawn_refresh_task(ISSUER, Duration::from_millis(40));
    tokio::time::sleep(Duration::from_millis(150)).await;
    task.abort();

    assert!(source.fetches() >= 2, "periodic refresh must keep fetching");
    resolver.resolve(ISSUER, KEY_ID).await.expect("cache warm");
    assert!(source.fetches() >= 2);
}

#[tokio::test]
async fn test_http_discovery_fetches_published_jwks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[KEY_ID])))
        .expect(1)
        .mount(&server)
        .await;

    let source = Arc::new(HttpDiscoverySource::new());
    let resolver = KeyResolver::new(source);
    resolver
        .resolve(&server.uri(), KEY_ID)
        .await
        .expect("key resolves over HTTP");
}

#[tokio::test]
async fn test_http_discovery_error_status_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = KeyCacheConfig {
        fetch_retries: 0,
        ..KeyCacheConfig::default()
    };
    let resolver = KeyResolver::with_config(Arc::new(HttpDiscoverySource::new()), config);

    let err = resolver
        .resolve(&server.uri(), KEY_ID)
        .await
        .expect_err("endpoint down");
    assert!(err.is_transient(), "{err}");
}

#[tokio::test]
async fn test_validator_over_http_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[KEY_ID])))
        .mount(&server)
        .await;

    let mut policy = hs256_policy();
    policy.key_source = server.uri();
    let validator = TokenValidator::new(
        policy,
        Arc::new(KeyResolver::new(Arc::new(HttpDiscoverySource::new()))),
    );

    let token = mint(KEY_ID, &standard_claims());
    let validated = validator.validate(&token).await.expect("full stack validates");
    assert_eq!(validated.subject(), "user-42");
}
