//! Delegation chain tests
//!
//! Simulates a multi-hop call chain: each "service" authenticates the
//! inbound headers, then uses the forwarder to build the outbound headers
//! for the next service. The token must survive the chain byte for byte
//! and the hop ceiling must stop the chain where configured.

mod common;

use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};

use common::{KEY_ID, hs256_validator, mint, standard_claims};
use passway_auth::authenticator::Authenticator;
use passway_auth::bearer;
use passway_auth::delegation::{
    DelegationContext, DelegationForwarder, DelegationPolicy, HOP_COUNT_HEADER,
};
use passway_core::{AuthError, RawToken};

fn inbound_headers(token: &RawToken) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token.as_str())).expect("header"),
    );
    headers
}

#[tokio::test]
async fn test_one_level_delegation_chain() {
    let authenticator = Authenticator::new(Arc::new(hs256_validator(&[KEY_ID]).await));
    let forwarder = DelegationForwarder::new(DelegationPolicy::new(1));
    let token = mint(KEY_ID, &standard_claims());

    // Service A: first hop, authenticates and forwards.
    let outcome_a = authenticator
        .authenticate(&inbound_headers(&token))
        .await
        .expect("service A authenticates");
    assert_eq!(outcome_a.delegation.hops(), 0);

    let mut outbound = HeaderMap::new();
    forwarder
        .attach(&mut outbound, &outcome_a.delegation)
        .expect("A may forward to B");

    // Service B: sees hop 1, authenticates the same token.
    let outcome_b = authenticator
        .authenticate(&outbound)
        .await
        .expect("service B authenticates");
    assert_eq!(outcome_b.delegation.hops(), 1);
    assert_eq!(
        outcome_b.delegation.token().as_str(),
        token.as_str(),
        "token must travel unchanged"
    );
    assert_eq!(outcome_b.identity.subject, outcome_a.identity.subject);

    // Service B may not forward again under a one-level policy.
    let mut next = HeaderMap::new();
    let err = forwarder
        .attach(&mut next, &outcome_b.delegation)
        .expect_err("B must not forward to C");
    assert_eq!(
        err,
        AuthError::DelegationDepthExceeded {
            hops: 2,
            max_hops: 1
        }
    );
}

#[tokio::test]
async fn test_deeper_ceiling_allows_longer_chains() {
    let authenticator = Authenticator::new(Arc::new(hs256_validator(&[KEY_ID]).await));
    let forwarder = DelegationForwarder::new(DelegationPolicy::new(3));
    let token = mint(KEY_ID, &standard_claims());

    let mut headers = inbound_headers(&token);
    for expected_hops in 0..3 {
        let outcome = authenticator
            .authenticate(&headers)
            .await
            .expect("hop authenticates");
        assert_eq!(outcome.delegation.hops(), expected_hops);

        let mut outbound = HeaderMap::new();
        forwarder
            .attach(&mut outbound, &outcome.delegation)
            .expect("within ceiling");
        headers = outbound;
    }

    let outcome = authenticator
        .authenticate(&headers)
        .await
        .expect("final hop authenticates");
    assert_eq!(outcome.delegation.hops(), 3);
    let mut outbound = HeaderMap::new();
    assert!(forwarder.attach(&mut outbound, &outcome.delegation).is_err());
}

#[test]
fn test_check_depth_scenario_from_the_chain_rule() {
    // A context that already took two hops under a one-level policy is an
    // architectural violation regardless of any forwarding attempt.
    let forwarder = DelegationForwarder::new(DelegationPolicy::new(1));
    let context = DelegationContext::with_hops(RawToken::new("h.c.s"), 2);

    let err = forwarder.check_depth(&context).expect_err("over ceiling");
    assert_eq!(
        err,
        AuthError::DelegationDepthExceeded {
            hops: 2,
            max_hops: 1
        }
    );
}

#[test]
fn test_forwarded_headers_round_trip_through_extraction() {
    let forwarder = DelegationForwarder::new(DelegationPolicy::new(2));
    let token = RawToken::new("header.claims.signature");
    let context = DelegationContext::new(token.clone());

    let mut outbound = HeaderMap::new();
    forwarder.attach(&mut outbound, &context).expect("attach");

    let next = bearer::delegation_context(&outbound).expect("extract");
    assert_eq!(next.token().as_str(), token.as_str());
    assert_eq!(next.hops(), 1);
    assert_eq!(
        outbound
            .get(HOP_COUNT_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some("1")
    );
}
