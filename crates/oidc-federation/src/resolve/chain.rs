//! The result of a successful resolution.

use serde_json::{json, Map, Value};

use crate::entity::{EntityId, EntityStatement, EntityType};
use crate::error::{FederationError, Result};
use crate::policy::MetadataPolicy;

/// A verified trust chain and the metadata it yields.
///
/// Statements run from the trust anchor's configuration to the leaf's
/// configuration. Each statement is issued by the subject of the one
/// before it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustChain {
    statements: Vec<EntityStatement>,
    expires_at: i64,
    entity_type: EntityType,
    policy: MetadataPolicy,
    metadata: Map<String, Value>,
}

impl TrustChain {
    /// Assemble a chain, checking it is non-empty and linked.
    pub fn new(
        statements: Vec<EntityStatement>,
        entity_type: EntityType,
        policy: MetadataPolicy,
        metadata: Map<String, Value>,
    ) -> Result<Self> {
        let expires_at = statements
            .iter()
            .map(|s| s.expires_at)
            .min()
            .ok_or_else(|| FederationError::StatementMismatch("empty trust chain".into()))?;

        for pair in statements.windows(2) {
            if pair[1].issuer != pair[0].subject {
                return Err(FederationError::StatementMismatch(format!(
                    "statement issued by {} does not follow statement about {}",
                    pair[1].issuer, pair[0].subject
                )));
            }
        }

        Ok(Self {
            statements,
            expires_at,
            entity_type,
            policy,
            metadata,
        })
    }

    /// All statements, trust anchor first.
    pub fn statements(&self) -> &[EntityStatement] {
        &self.statements
    }

    /// The trust anchor's configuration.
    pub fn anchor(&self) -> &EntityStatement {
        &self.statements[0]
    }

    /// The leaf's configuration.
    pub fn leaf(&self) -> &EntityStatement {
        &self.statements[self.statements.len() - 1]
    }

    pub fn trust_anchor_id(&self) -> &EntityId {
        &self.anchor().subject
    }

    pub fn leaf_id(&self) -> &EntityId {
        &self.leaf().subject
    }

    /// Entity identifiers from the trust anchor down to the leaf.
    pub fn entity_path(&self) -> Vec<&EntityId> {
        let mut path: Vec<&EntityId> = self.statements.iter().map(|s| &s.subject).collect();
        path.dedup();
        path
    }

    /// Earliest expiration among the statements.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// The merged policy of the chain's authorities.
    pub fn effective_policy(&self) -> &MetadataPolicy {
        &self.policy
    }

    /// The leaf's metadata after the policy was applied.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Always false: a chain holds at least the leaf.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Summary of the chain as JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "trust_anchor": self.trust_anchor_id(),
            "subject": self.leaf_id(),
            "entity_type": self.entity_type,
            "path": self.entity_path(),
            "expires_at": self.expires_at,
            "expires": crate::time::secs_to_rfc3339(self.expires_at),
            "metadata_policy": self.policy.to_json(),
            "metadata": self.metadata,
        })
    }
}
