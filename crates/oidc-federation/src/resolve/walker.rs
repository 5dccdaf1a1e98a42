//! Trust chain resolution: walking authority hints up to a trust anchor.
//!
//! The walk is a depth-first search over authority hints driven by an
//! explicit frame stack. Each frame stands for one entity on the current
//! path, starting with the leaf, and remembers which of its hints are
//! still untried. For a hint `h` of the entity `e` on top of the stack:
//!
//! 1. fetch and self-verify `h`'s configuration (the trust anchor's is
//!    verified with the configured anchor keys instead)
//! 2. fetch the statement `h` issued about `e` and verify it with `h`'s keys
//! 3. check subject, validity window, cycles and the hop limit
//! 4. check `e`'s keys are the ones `h` vouches for
//! 5. apply the statement's constraints
//!
//! A failing hint is skipped and the next one tried; an exhausted frame is
//! popped. The first path to reach the trust anchor wins.
//!
//! `max_path_length` in a statement about `e` bounds the entities between
//! `e` and the trust anchor; the tightest bound seen so far is carried up
//! the path, one entity spent per intermediate. Naming constraints in a
//! statement about `e` restrict the entities below `e`, all of which are
//! already on the path when the statement is fetched.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::crypto::{Ed25519JwsVerifier, JwkSet};
use crate::entity::{EntityId, EntityStatement, EntityType};
use crate::error::{ConstraintViolation, FederationError, Result};
use crate::policy::{MetadataPolicy, MetadataPolicyEngine};
use crate::time::{Clock, SystemClock};

use super::chain::TrustChain;
use super::collaborators::{Fetcher, Verifier};
use super::state::ResolutionState;

/// Default bound on the statements in a path.
pub const DEFAULT_MAX_HOPS: usize = 10;

/// Options for one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    /// Maximum statements on a path from the leaf, the leaf's own
    /// configuration included and the anchor's excluded.
    pub max_hops: usize,
    /// The metadata type to resolve.
    pub entity_type: EntityType,
    /// Evaluation time; the resolver's clock when unset.
    pub now: Option<i64>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            entity_type: EntityType::openid_relying_party(),
            now: None,
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = entity_type;
        self
    }

    /// Evaluate validity windows at a fixed time.
    pub fn at_time(mut self, now: i64) -> Self {
        self.now = Some(now);
        self
    }
}

/// Resolves trust chains with a fetcher, a verifier and a clock.
///
/// Holds no per-resolution state, so one resolver can serve concurrent
/// resolutions from many threads.
pub struct TrustChainResolver<F, V = Ed25519JwsVerifier> {
    fetcher: F,
    verifier: V,
    clock: Arc<dyn Clock>,
}

impl<F: Fetcher> TrustChainResolver<F, Ed25519JwsVerifier> {
    /// A resolver verifying Ed25519 statements against the system clock.
    pub fn new(fetcher: F) -> Self {
        Self::with_verifier(fetcher, Ed25519JwsVerifier)
    }
}

impl<F: Fetcher, V: Verifier> TrustChainResolver<F, V> {
    pub fn with_verifier(fetcher: F, verifier: V) -> Self {
        Self {
            fetcher,
            verifier,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolve a chain from an already verified leaf configuration.
    pub fn resolve(
        &self,
        leaf: &EntityStatement,
        anchor_id: &EntityId,
        anchor_keys: &JwkSet,
        options: &ResolveOptions,
    ) -> Result<TrustChain> {
        let now = options.now.unwrap_or_else(|| self.clock.now());
        Walk::new(self, leaf, anchor_id, anchor_keys, options, now).run()
    }

    /// Fetch and self-verify the leaf configuration, then resolve.
    pub fn resolve_entity(
        &self,
        leaf_id: &EntityId,
        anchor_id: &EntityId,
        anchor_keys: &JwkSet,
        options: &ResolveOptions,
    ) -> Result<TrustChain> {
        let leaf = self.fetch_configuration(leaf_id)?;
        self.resolve(&leaf, anchor_id, anchor_keys, options)
    }

    /// Fetch an entity configuration and verify it with its own keys.
    pub fn fetch_configuration(&self, entity: &EntityId) -> Result<EntityStatement> {
        let raw = self.fetcher.fetch_statement(entity, entity)?;
        let unverified = EntityStatement::from_claims(&self.verifier.decode_unverified(&raw)?)?;
        let claims = self.verifier.verify(&raw, &unverified.keys)?;
        let configuration = EntityStatement::from_claims(&claims)?;
        expect_statement(&configuration, entity, entity)?;
        Ok(configuration)
    }

    fn fetch_subordinate(
        &self,
        issuer: &EntityId,
        subject: &EntityId,
        issuer_keys: &JwkSet,
    ) -> Result<EntityStatement> {
        let raw = self.fetcher.fetch_statement(issuer, subject)?;
        let claims = self.verifier.verify(&raw, issuer_keys)?;
        let statement = EntityStatement::from_claims(&claims)?;
        expect_statement(&statement, issuer, subject)?;
        Ok(statement)
    }
}

fn expect_statement(
    statement: &EntityStatement,
    issuer: &EntityId,
    subject: &EntityId,
) -> Result<()> {
    if &statement.issuer != issuer || &statement.subject != subject {
        return Err(FederationError::StatementMismatch(format!(
            "expected statement by {issuer} about {subject}, got one by {} about {}",
            statement.issuer, statement.subject
        )));
    }
    Ok(())
}

/// One entity on the current path.
#[derive(Debug, Clone)]
struct Frame {
    /// The entity whose superiors are being tried.
    entity: EntityId,
    /// The keys the entity signs with.
    keys: JwkSet,
    /// The entity's authority hints.
    hints: Vec<EntityId>,
    /// Index of the next untried hint.
    next_hint: usize,
    /// The statement the entity issued about the frame below, absent for
    /// the leaf.
    vouching: Option<EntityStatement>,
    /// Entities still allowed between this entity and the trust anchor.
    remaining_path_length: Option<u32>,
    /// The `max_path_length` that set `remaining_path_length`.
    path_length_limit: Option<u32>,
    /// Entities strictly below this one, leaf first.
    below: Vec<EntityId>,
}

impl Frame {
    fn take_hint(&mut self) -> Option<EntityId> {
        let hint = self.hints.get(self.next_hint)?.clone();
        self.next_hint += 1;
        Some(hint)
    }
}

/// A failed hint, remembered for diagnosis.
struct Failure {
    depth: usize,
    error: FederationError,
}

/// Where a successful hint leads.
enum Step {
    Anchor(EntityStatement),
    Push(Frame),
}

/// The mutable state of one resolution.
struct Walk<'r, F, V> {
    resolver: &'r TrustChainResolver<F, V>,
    leaf: &'r EntityStatement,
    anchor_id: &'r EntityId,
    anchor_keys: &'r JwkSet,
    options: &'r ResolveOptions,
    now: i64,
    state: ResolutionState,
    frames: Vec<Frame>,
    anchor_configuration: Option<EntityStatement>,
    deepest_failure: Option<Failure>,
}

impl<'r, F: Fetcher, V: Verifier> Walk<'r, F, V> {
    fn new(
        resolver: &'r TrustChainResolver<F, V>,
        leaf: &'r EntityStatement,
        anchor_id: &'r EntityId,
        anchor_keys: &'r JwkSet,
        options: &'r ResolveOptions,
        now: i64,
    ) -> Self {
        Self {
            resolver,
            leaf,
            anchor_id,
            anchor_keys,
            options,
            now,
            state: ResolutionState::Start,
            frames: Vec::new(),
            anchor_configuration: None,
            deepest_failure: None,
        }
    }

    fn transition(&mut self, next: ResolutionState) {
        debug_assert!(self.state.can_transition_to(next), "{} -> {next}", self.state);
        log::debug!("resolution of {}: {} -> {next}", self.leaf.subject, self.state);
        self.state = next;
    }

    fn fail(&mut self, error: FederationError) -> FederationError {
        let state = error.resolution_state();
        if self.state.can_transition_to(state) {
            self.transition(state);
        }
        error
    }

    fn run(mut self) -> Result<TrustChain> {
        let leaf = self.leaf;
        if !leaf.is_self_issued() {
            return Err(FederationError::StatementMismatch(format!(
                "leaf statement by {} about {} is not an entity configuration",
                leaf.issuer, leaf.subject
            )));
        }
        let max_path_length = leaf.constraints.as_ref().and_then(|c| c.max_path_length);
        self.frames.push(Frame {
            entity: leaf.subject.clone(),
            keys: leaf.keys.clone(),
            hints: leaf.authority_hints().to_vec(),
            next_hint: 0,
            vouching: None,
            remaining_path_length: max_path_length,
            path_length_limit: max_path_length,
            below: Vec::new(),
        });
        self.transition(ResolutionState::Resolving);

        if let Err(e) = leaf
            .check_validity(self.now)
            .and_then(|_| leaf.validate_required_claims())
        {
            return Err(self.fail(e));
        }

        let path = if &leaf.subject == self.anchor_id {
            if !leaf.keys.shares_key_with(self.anchor_keys) {
                return Err(self.fail(FederationError::SignatureInvalid(format!(
                    "configuration of {} is not signed with the trust anchor keys",
                    leaf.subject
                ))));
            }
            vec![leaf.clone()]
        } else {
            match self.search() {
                Ok(path) => {
                    let mut statements = Vec::with_capacity(path.len() + 1);
                    statements.extend(path);
                    statements.push(leaf.clone());
                    statements
                }
                Err(e) => return Err(self.fail(e)),
            }
        };

        self.transition(ResolutionState::AnchorReached);
        log::info!(
            "trust chain for {} reached {} in {} statements",
            leaf.subject,
            self.anchor_id,
            path.len()
        );
        self.finish(path, leaf)
    }

    /// Depth-first search; returns the statements from the anchor's
    /// configuration down to, but not including, the leaf's.
    fn search(&mut self) -> Result<Vec<EntityStatement>> {
        loop {
            let Some(top) = self.frames.last_mut() else {
                break;
            };
            let Some(hint) = top.take_hint() else {
                let exhausted = self.frames.pop();
                if let Some(frame) = exhausted {
                    log::debug!("authority hints of {} exhausted, backtracking", frame.entity);
                }
                continue;
            };

            let depth = self.frames.len();
            log::debug!("trying authority hint {hint} at depth {depth}");
            match self.step(&hint) {
                Ok(Step::Anchor(statement)) => return self.path_to_anchor(statement),
                Ok(Step::Push(frame)) => self.frames.push(frame),
                Err(error) => {
                    log::warn!("authority hint {hint} rejected: {error}");
                    self.record_failure(depth, error);
                }
            }
        }

        match self.deepest_failure.take() {
            Some(failure) => Err(failure.error),
            None => Err(FederationError::NoTrustPath {
                leaf: self.leaf.subject.clone(),
                anchor: self.anchor_id.clone(),
            }),
        }
    }

    /// Keep the deepest failure; fetch failures only report a missing path.
    fn record_failure(&mut self, depth: usize, error: FederationError) {
        if matches!(error, FederationError::Fetch(_)) {
            return;
        }
        let deeper = self
            .deepest_failure
            .as_ref()
            .map_or(true, |current| depth > current.depth);
        if deeper {
            self.deepest_failure = Some(Failure { depth, error });
        }
    }

    fn step(&mut self, hint: &EntityId) -> Result<Step> {
        if self.frames.iter().any(|f| &f.entity == hint) {
            return Err(FederationError::CycleDetected(hint.clone()));
        }
        if self.frames.len() >= self.options.max_hops {
            return Err(FederationError::HopLimitExceeded(self.options.max_hops));
        }

        let is_anchor = hint == self.anchor_id;
        let configuration = if is_anchor {
            self.anchor_configuration()?
        } else {
            self.resolver.fetch_configuration(hint)?
        };
        configuration.check_validity(self.now)?;
        configuration.validate_required_claims()?;

        let top = self
            .frames
            .last()
            .ok_or_else(|| FederationError::StatementMismatch("empty frame stack".into()))?;
        let hint_keys = if is_anchor {
            self.anchor_keys
        } else {
            &configuration.keys
        };
        let statement = self.resolver.fetch_subordinate(hint, &top.entity, hint_keys)?;
        statement.check_validity(self.now)?;
        statement.validate_required_claims()?;

        if !statement.keys.shares_key_with(&top.keys) {
            return Err(FederationError::SignatureInvalid(format!(
                "{hint} does not vouch for the keys of {}",
                top.entity
            )));
        }

        if let Some(constraints) = &statement.constraints {
            for entity in &top.below {
                constraints.check_naming(entity)?;
            }
        }

        let max_path_length = statement.constraints.as_ref().and_then(|c| c.max_path_length);
        let (remaining, limit) = match (top.remaining_path_length, max_path_length) {
            (Some(r), Some(m)) if m < r => (Some(m), Some(m)),
            (Some(r), _) => (Some(r), top.path_length_limit),
            (None, m) => (m, m),
        };

        if is_anchor {
            return Ok(Step::Anchor(statement));
        }

        let remaining_path_length = match remaining {
            Some(0) => {
                return Err(ConstraintViolation::MaxPathLengthExceeded {
                    entity: hint.clone(),
                    max: limit.unwrap_or(0),
                }
                .into())
            }
            Some(n) => Some(n - 1),
            None => None,
        };

        let mut below = top.below.clone();
        below.push(top.entity.clone());

        Ok(Step::Push(Frame {
            entity: hint.clone(),
            keys: configuration.keys.clone(),
            hints: configuration.authority_hints().to_vec(),
            next_hint: 0,
            vouching: Some(statement),
            remaining_path_length,
            path_length_limit: limit,
            below,
        }))
    }

    fn anchor_configuration(&mut self) -> Result<EntityStatement> {
        if let Some(configuration) = &self.anchor_configuration {
            return Ok(configuration.clone());
        }
        let raw = self
            .resolver
            .fetcher
            .fetch_statement(self.anchor_id, self.anchor_id)?;
        let claims = self.resolver.verifier.verify(&raw, self.anchor_keys)?;
        let configuration = EntityStatement::from_claims(&claims)?;
        expect_statement(&configuration, self.anchor_id, self.anchor_id)?;
        self.anchor_configuration = Some(configuration.clone());
        Ok(configuration)
    }

    fn path_to_anchor(&mut self, from_anchor: EntityStatement) -> Result<Vec<EntityStatement>> {
        let anchor = self.anchor_configuration()?;
        let mut path = vec![anchor, from_anchor];
        path.extend(self.frames.iter().rev().filter_map(|f| f.vouching.clone()));
        Ok(path)
    }

    fn finish(
        mut self,
        statements: Vec<EntityStatement>,
        leaf: &EntityStatement,
    ) -> Result<TrustChain> {
        let entity_type = self.options.entity_type.clone();

        self.transition(ResolutionState::PolicyMerging);
        let superiors = &statements[..statements.len() - 1];
        let policy = match MetadataPolicyEngine::new(entity_type.clone()).merge(superiors) {
            Ok(policy) => policy,
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(ResolutionState::PolicyApplying);
        let metadata = match self.apply(&policy, leaf, &entity_type) {
            Ok(metadata) => metadata,
            Err(e) => return Err(self.fail(e)),
        };

        let chain = TrustChain::new(statements, entity_type, policy, metadata)?;
        self.transition(ResolutionState::Resolved);
        Ok(chain)
    }

    fn apply(
        &self,
        policy: &MetadataPolicy,
        leaf: &EntityStatement,
        entity_type: &EntityType,
    ) -> Result<Map<String, Value>> {
        let metadata = leaf
            .metadata_for(entity_type)
            .ok_or_else(|| FederationError::MetadataNotFound(entity_type.to_string()))?;
        policy.apply(metadata)
    }
}
