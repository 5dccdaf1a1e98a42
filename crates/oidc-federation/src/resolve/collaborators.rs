//! Collaborators the resolver calls out to.
//!
//! Retrieval and signature checking live outside the resolver. Both are
//! called synchronously, one at a time, so the order of attempts during a
//! resolution is fully determined by the fetched statements.

use std::sync::Arc;

use serde_json::Value;

use crate::crypto::JwkSet;
use crate::entity::EntityId;
use crate::error::{FetchError, Result};

/// Retrieves raw signed entity statements.
///
/// `fetch_statement(e, e)` returns the entity configuration of `e`;
/// `fetch_statement(sup, sub)` returns the statement `sup` issued about
/// `sub`. Timeouts and cancellation are reported as [`FetchError`]s.
pub trait Fetcher: Send + Sync {
    fn fetch_statement(
        &self,
        issuer: &EntityId,
        subject: &EntityId,
    ) -> std::result::Result<String, FetchError>;
}

/// Verifies signed statements against a key set.
pub trait Verifier: Send + Sync {
    /// Verify `raw_jws` with one of `keys` and return its claims.
    fn verify(&self, raw_jws: &str, keys: &JwkSet) -> Result<Value>;

    /// Decode the claims without verifying.
    ///
    /// Needed to read the keys of a self-signed entity configuration
    /// before those keys can verify it.
    fn decode_unverified(&self, raw_jws: &str) -> Result<Value>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn fetch_statement(
        &self,
        issuer: &EntityId,
        subject: &EntityId,
    ) -> std::result::Result<String, FetchError> {
        (**self).fetch_statement(issuer, subject)
    }
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn fetch_statement(
        &self,
        issuer: &EntityId,
        subject: &EntityId,
    ) -> std::result::Result<String, FetchError> {
        (**self).fetch_statement(issuer, subject)
    }
}

impl<T: Verifier + ?Sized> Verifier for &T {
    fn verify(&self, raw_jws: &str, keys: &JwkSet) -> Result<Value> {
        (**self).verify(raw_jws, keys)
    }

    fn decode_unverified(&self, raw_jws: &str) -> Result<Value> {
        (**self).decode_unverified(raw_jws)
    }
}

impl<T: Verifier + ?Sized> Verifier for Arc<T> {
    fn verify(&self, raw_jws: &str, keys: &JwkSet) -> Result<Value> {
        (**self).verify(raw_jws, keys)
    }

    fn decode_unverified(&self, raw_jws: &str) -> Result<Value> {
        (**self).decode_unverified(raw_jws)
    }
}
