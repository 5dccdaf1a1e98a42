//! Trust chain resolution.
//!
//! This module provides:
//! - The [`Fetcher`] and [`Verifier`] collaborator traits
//! - [`TrustChainResolver`], the backtracking chain walker
//! - [`TrustChain`], the verified result
//! - [`ResolutionState`], the states of a resolution

pub mod chain;
pub mod collaborators;
pub mod state;
pub mod walker;

pub use chain::TrustChain;
pub use collaborators::{Fetcher, Verifier};
pub use state::ResolutionState;
pub use walker::{ResolveOptions, TrustChainResolver, DEFAULT_MAX_HOPS};

use crate::crypto::JwkSet;
use crate::entity::{EntityId, EntityStatement};
use crate::error::Result;

/// Resolve a trust chain from a verified leaf configuration to a trust
/// anchor, merge the chain's metadata policies and apply them to the
/// leaf's metadata.
///
/// Without `options.now` the system clock is used.
pub fn resolve_trust_chain<F, V>(
    fetcher: F,
    verifier: V,
    leaf: &EntityStatement,
    anchor_id: &EntityId,
    anchor_keys: &JwkSet,
    options: &ResolveOptions,
) -> Result<TrustChain>
where
    F: Fetcher,
    V: Verifier,
{
    TrustChainResolver::with_verifier(fetcher, verifier).resolve(leaf, anchor_id, anchor_keys, options)
}
