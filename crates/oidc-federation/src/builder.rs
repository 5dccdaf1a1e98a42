//! Building and signing entity statements.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::crypto::{sign_claims, FederationKey, JwkSet};
use crate::entity::{EntityId, EntityStatement, EntityType, TrustChainConstraints};
use crate::error::{FederationError, Result};
use crate::policy::MetadataPolicy;
use crate::time::{Clock, SystemClock};

/// Default statement lifetime: one day.
pub const DEFAULT_LIFETIME_SECS: i64 = 86_400;

/// Builder for entity statements.
#[derive(Debug, Clone)]
pub struct EntityStatementBuilder {
    issuer: EntityId,
    subject: EntityId,
    keys: JwkSet,
    issued_at: Option<i64>,
    expires_at: Option<i64>,
    audience: Option<Vec<String>>,
    metadata: BTreeMap<EntityType, Map<String, Value>>,
    metadata_policy: Option<BTreeMap<EntityType, MetadataPolicy>>,
    constraints: Option<TrustChainConstraints>,
    authority_hints: Option<Vec<EntityId>>,
    critical: Vec<String>,
    policy_critical_operations: Vec<String>,
    other: Map<String, Value>,
}

impl EntityStatementBuilder {
    /// Start a statement by `issuer` about `subject`, carrying the
    /// subject's keys.
    pub fn new(issuer: EntityId, subject: EntityId, subject_keys: JwkSet) -> Self {
        Self {
            issuer,
            subject,
            keys: subject_keys,
            issued_at: None,
            expires_at: None,
            audience: None,
            metadata: BTreeMap::new(),
            metadata_policy: None,
            constraints: None,
            authority_hints: None,
            critical: Vec::new(),
            policy_critical_operations: Vec::new(),
            other: Map::new(),
        }
    }

    /// Start an entity configuration (`iss == sub`).
    pub fn configuration(entity: EntityId, keys: JwkSet) -> Self {
        Self::new(entity.clone(), entity, keys)
    }

    /// Set the issue time. Defaults to the build clock's now.
    pub fn issued_at(mut self, iat: i64) -> Self {
        self.issued_at = Some(iat);
        self
    }

    /// Set the expiration time. Defaults to a day after issue.
    pub fn expires_at(mut self, exp: i64) -> Self {
        self.expires_at = Some(exp);
        self
    }

    /// Set issue and expiration times together.
    pub fn validity(self, iat: i64, exp: i64) -> Self {
        self.issued_at(iat).expires_at(exp)
    }

    /// Add an audience.
    pub fn audience(mut self, aud: impl Into<String>) -> Self {
        self.audience.get_or_insert_with(Vec::new).push(aud.into());
        self
    }

    /// Set the metadata for one entity type.
    pub fn metadata(mut self, entity_type: EntityType, metadata: Map<String, Value>) -> Self {
        self.metadata.insert(entity_type, metadata);
        self
    }

    /// Set the metadata policy for one entity type.
    pub fn metadata_policy(mut self, entity_type: EntityType, policy: MetadataPolicy) -> Self {
        self.metadata_policy
            .get_or_insert_with(BTreeMap::new)
            .insert(entity_type, policy);
        self
    }

    /// Set the constraints.
    pub fn constraints(mut self, constraints: TrustChainConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Add an authority hint.
    pub fn authority_hint(mut self, hint: EntityId) -> Self {
        self.authority_hints.get_or_insert_with(Vec::new).push(hint);
        self
    }

    /// Add several authority hints.
    pub fn authority_hints(mut self, hints: Vec<EntityId>) -> Self {
        self.authority_hints
            .get_or_insert_with(Vec::new)
            .extend(hints);
        self
    }

    /// Mark an extension claim critical.
    pub fn critical(mut self, claim: impl Into<String>) -> Self {
        self.critical.push(claim.into());
        self
    }

    /// Mark a policy operation critical.
    pub fn policy_critical(mut self, operation: impl Into<String>) -> Self {
        self.policy_critical_operations.push(operation.into());
        self
    }

    /// Add an extension claim such as `jti`.
    pub fn claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.other.insert(name.into(), value);
        self
    }

    /// Finish the statement without signing, against the system clock.
    pub fn build(self) -> Result<EntityStatement> {
        self.build_with_clock(&SystemClock)
    }

    /// Finish the statement, taking a missing `iat` from `clock`.
    pub fn build_with_clock(self, clock: &dyn Clock) -> Result<EntityStatement> {
        let issued_at = self.issued_at.unwrap_or_else(|| clock.now());
        let expires_at = self.expires_at.unwrap_or(issued_at + DEFAULT_LIFETIME_SECS);
        if expires_at <= issued_at {
            return Err(FederationError::Parse(format!(
                "exp {expires_at} must be after iat {issued_at}"
            )));
        }

        let statement = EntityStatement {
            issuer: self.issuer,
            subject: self.subject,
            issued_at,
            expires_at,
            keys: self.keys,
            audience: self.audience,
            metadata: self.metadata,
            metadata_policy: self.metadata_policy,
            constraints: self.constraints,
            authority_hints: self.authority_hints,
            critical: self.critical,
            policy_critical_operations: self.policy_critical_operations,
            other: Map::new(),
        };

        // Extension claims go through the claims form so a registered name
        // cannot shadow a typed field.
        if self.other.is_empty() {
            return Ok(statement);
        }
        let mut claims = statement.to_claims();
        if let Value::Object(obj) = &mut claims {
            for (name, value) in self.other {
                if obj.contains_key(&name) {
                    return Err(FederationError::Parse(format!(
                        "extension claim {name} collides with a registered claim"
                    )));
                }
                obj.insert(name, value);
            }
        }
        EntityStatement::from_claims(&claims)
    }

    /// Finish and sign the statement with the issuer's key.
    pub fn sign(self, issuer_key: &FederationKey) -> Result<String> {
        self.sign_with_clock(issuer_key, &SystemClock)
    }

    /// Finish against `clock` and sign with the issuer's key.
    pub fn sign_with_clock(self, issuer_key: &FederationKey, clock: &dyn Clock) -> Result<String> {
        let statement = self.build_with_clock(clock)?;
        sign_claims(&statement.to_claims(), issuer_key)
    }
}
