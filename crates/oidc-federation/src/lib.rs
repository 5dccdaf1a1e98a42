//! oidc-federation: trust chain resolution for OpenID Connect Federation.
//!
//! Walks authority hints from a leaf entity up to a configured trust
//! anchor, verifying each signed entity statement along the way, then
//! merges the metadata policies of the chain and applies the result to
//! the leaf's metadata.
//!
//! Fetching and signature verification are injected through the
//! [`Fetcher`] and [`Verifier`] traits.

pub mod builder;
pub mod crypto;
pub mod entity;
pub mod error;
pub mod policy;
pub mod resolve;
pub mod storage;
pub mod time;

// Re-export primary types
pub use builder::EntityStatementBuilder;
pub use crypto::{CompactJws, Ed25519JwsVerifier, FederationKey, Jwk, JwkSet};
pub use entity::{EntityId, EntityStatement, EntityType, TrustChainConstraints};
pub use error::{
    ConstraintViolation, FederationError, FetchError, PolicyViolation, PolicyViolationKind, Result,
};

// Re-export policy types
pub use policy::{
    apply_policy, merge_policies, AbsentParameterRule, MetadataPolicy, MetadataPolicyEngine,
    MetadataPolicyEntry, PolicyOperation,
};

// Re-export resolution types
pub use resolve::{
    resolve_trust_chain, Fetcher, ResolutionState, ResolveOptions, TrustChain, TrustChainResolver,
    Verifier,
};
pub use storage::{MemoryFetcher, StatementStore};
pub use time::{Clock, FixedClock, SystemClock};
