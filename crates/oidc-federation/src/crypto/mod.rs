//! Cryptographic collaborators for oidc-federation.
//!
//! This module provides:
//! - JSON Web Keys and key sets with RFC 7638 thumbprints
//! - Ed25519 federation signing keys
//! - Compact JWS (via `jsonwebtoken`) and the default statement [`Verifier`](crate::resolve::Verifier)

pub mod jwk;
pub mod jws;
pub mod keys;

pub use jwk::{Jwk, JwkSet};
pub use jws::{sign_claims, CompactJws, Ed25519JwsVerifier};
pub use keys::FederationKey;
