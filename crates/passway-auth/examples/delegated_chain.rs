//! Two-service delegation walkthrough.
//!
//! Mints an HS256 token the way an authorization server would, then plays
//! both services in a one-level delegation chain: service A authenticates
//! the inbound request and forwards the token to service B; B authenticates
//! it again and is refused a further forward.
//!
//! Run with: `cargo run --example delegated_chain`

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};
use serde_json::json;

use passway_auth::keys::{KeySet, StaticDiscovery};
use passway_auth::policy::ValidationPolicy;
use passway_auth::{Algorithm, AuthConfig, Authenticator, DelegationForwarder};

const ISSUER: &str = "https://auth.example.com";
const KEY_ID: &str = "demo-key";
const SECRET: &[u8] = b"demo-secret-material-32-bytes-min!!";

fn mint_token() -> String {
    let mut header = jsonwebtoken::Header::new(Algorithm::HS256);
    header.kid = Some(KEY_ID.to_string());
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
        + 3600;
    jsonwebtoken::encode(
        &header,
        &json!({
            "iss": ISSUER,
            "sub": "user-42",
            "aud": "svc-a",
            "exp": exp,
            "name": "Alice Example",
            "email": "alice@example.com",
        }),
        &jsonwebtoken::EncodingKey::from_secret(SECRET),
    )
    .expect("token encodes")
}

async fn demo_discovery() -> Arc<StaticDiscovery> {
    let jwk = serde_json::from_value(json!({
        "kty": "oct",
        "kid": KEY_ID,
        "k": URL_SAFE_NO_PAD.encode(SECRET),
    }))
    .expect("jwk");
    let mut keys = KeySet::new();
    keys.insert(KEY_ID, jwk);

    let source = StaticDiscovery::new();
    source.set_keys(ISSUER, keys).await;
    Arc::new(source)
}

async fn handle(
    service: &str,
    authenticator: &Authenticator,
    forwarder: &DelegationForwarder,
    headers: &HeaderMap,
) -> Option<HeaderMap> {
    let outcome = match authenticator.authenticate(headers).await {
        Ok(outcome) => outcome,
        Err(err) => {
            println!("{service}: rejected ({err}) -> {}", err.status_hint());
            return None;
        }
    };
    println!(
        "{service}: authenticated {} <{}> at hop {}",
        outcome.identity.subject,
        outcome.identity.email.as_deref().unwrap_or("-"),
        outcome.delegation.hops(),
    );

    let mut outbound = HeaderMap::new();
    match forwarder.attach(&mut outbound, &outcome.delegation) {
        Ok(()) => {
            println!("{service}: forwarding downstream");
            Some(outbound)
        }
        Err(err) => {
            println!("{service}: not forwarding ({err})");
            None
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = AuthConfig::new(
        ValidationPolicy::new(ISSUER)
            .with_issuer(ISSUER)
            .with_algorithms(vec![Algorithm::HS256]),
        1,
    );
    let (authenticator, forwarder) = config.build(demo_discovery().await);

    let mut inbound = HeaderMap::new();
    inbound.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", mint_token())).expect("header"),
    );

    // Service A, then service B with whatever A forwarded.
    if let Some(next) = handle("svc-a", &authenticator, &forwarder, &inbound).await {
        handle("svc-b", &authenticator, &forwarder, &next).await;
    }
}
