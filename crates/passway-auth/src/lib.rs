//! # Passway Auth - Delegated Bearer Authentication
//!
//! Validation and delegation of bearer identity tokens across a chain of
//! backend services. An inbound token is parsed, checked against a
//! per-instance policy, normalized into a canonical identity, and - when
//! the handling service calls a further downstream service - reused
//! unchanged on the outbound request with an explicit hop-count ceiling.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   Authenticator                      │
//! │  bearer extraction → validation → normalization      │
//! └──────┬──────────────────┬───────────────────┬────────┘
//!        │                  │                   │
//!   ┌────┴─────┐      ┌─────┴──────┐      ┌─────┴──────┐
//!   │  codec   │      │ KeyResolver│      │  profiles  │
//!   │ (core)   │      │  + cache   │      │ per issuer │
//!   └──────────┘      └─────┬──────┘      └────────────┘
//!                           │
//!                   ┌───────┴────────┐
//!                   │ DiscoverySource│
//!                   └────────────────┘
//! ```
//!
//! - [`policy`] - per-instance validation policy (issuer/audience rules,
//!   clock skew, algorithm allowlist)
//! - [`keys`] - key resolution with per-issuer caching over a
//!   [`keys::DiscoverySource`]
//! - [`validator`] - the fail-fast validation state machine
//! - [`normalize`] - provider claim layouts and the canonical identity
//! - [`delegation`] - forwarding the token downstream with depth
//!   enforcement
//! - [`bearer`] - header extraction
//! - [`authenticator`] - the per-request facade
//! - [`config`] - deployment configuration wiring it all together
//!
//! ## Design Principles
//!
//! - **Fail fast, fail typed**: every rejection is one
//!   [`AuthError`] kind; parse, trust, and policy failures never blur.
//! - **No ambient state**: the inbound token travels in an explicit
//!   [`delegation::DelegationContext`], not a global.
//! - **Stale beats blocked**: key refresh is coalesced and best-effort; a
//!   stale-but-not-expired key set is preferred over blocking validation.

pub mod authenticator;
pub mod bearer;
pub mod config;
pub mod delegation;
pub mod keys;
pub mod normalize;
pub mod policy;
pub mod validator;

pub use authenticator::{AuthOutcome, Authenticator};
pub use config::AuthConfig;
pub use delegation::{DelegationContext, DelegationForwarder, DelegationPolicy, HOP_COUNT_HEADER};
pub use keys::{DiscoverySource, HttpDiscoverySource, KeyCacheConfig, KeyResolver, KeySet, StaticDiscovery};
pub use normalize::{Identity, ProviderProfile, normalize};
pub use policy::{AudienceRule, IssuerRule, ValidationPolicy};
pub use validator::{TokenValidator, ValidatedToken};

pub use passway_core::{AuthError, AuthResult, Audience, Claims, RawToken};

pub use jsonwebtoken::Algorithm;
