//! # Passway Core - Token Foundation Types
//!
//! Dependency-light foundation for the Passway delegated-authentication
//! stack: the compact token codec, the claims model, and the shared error
//! taxonomy. No I/O, no async, no cryptography - signature verification and
//! policy checks live in `passway-auth`.
//!
//! ## Design Principles
//!
//! - **Parsing and trust are separate**: [`codec::decode`] never verifies a
//!   signature or a claim value, so parse failures and trust failures are
//!   distinct [`AuthError`] kinds.
//! - **Tokens are opaque**: [`RawToken`] is carried byte for byte from the
//!   inbound request to any outbound delegated call and never rewritten.
//! - **One error taxonomy**: every failure the stack can surface is a
//!   variant of [`AuthError`], with `status_hint()` mapping each kind to its
//!   HTTP-equivalent response semantics.
//!
//! ## Quick Start
//!
//! ```rust
//! use passway_core::{codec, RawToken};
//!
//! let raw = RawToken::new(
//!     "eyJhbGciOiJSUzI1NiIsImtpZCI6ImstMSJ9.eyJzdWIiOiJ1c2VyLTQyIn0.c2ln",
//! );
//! let decoded = codec::decode(&raw)?;
//! assert_eq!(decoded.header().alg, "RS256");
//! assert_eq!(decoded.claims().sub(), Some("user-42"));
//! # Ok::<(), passway_core::AuthError>(())
//! ```

pub mod claims;
pub mod codec;
pub mod error;

pub use claims::{Audience, Claims};
pub use codec::{DecodedToken, Header, RawToken};
pub use error::{AuthError, AuthResult};
