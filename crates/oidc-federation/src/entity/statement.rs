//! Entity statements: the decoded claims of a signed statement.
//!
//! An entity statement is issued by `iss` about `sub`. When the two are
//! equal it is an entity configuration (a self-statement) and carries the
//! entity's own metadata and authority hints; otherwise it is a superior
//! vouching for a subordinate and may add a metadata policy and
//! constraints.
//!
//! Statements are immutable once parsed. Build new ones with
//! [`EntityStatementBuilder`](crate::builder::EntityStatementBuilder).

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::crypto::JwkSet;
use crate::error::{FederationError, Result};
use crate::policy::MetadataPolicy;

use super::constraints::TrustChainConstraints;
use super::id::{parse_id_list, EntityId};
use super::types::EntityType;

/// Claim names with a typed field in [`EntityStatement`].
const REGISTERED_CLAIMS: &[&str] = &[
    "iss",
    "sub",
    "iat",
    "exp",
    "jwks",
    "aud",
    "metadata",
    "metadata_policy",
    "constraints",
    "authority_hints",
    "crit",
    "policy_language_crit",
];

/// A decoded entity statement.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStatement {
    /// Issuer (`iss`).
    pub issuer: EntityId,
    /// Subject (`sub`).
    pub subject: EntityId,
    /// Issued-at time (`iat`), seconds since the epoch.
    pub issued_at: i64,
    /// Expiration time (`exp`), seconds since the epoch.
    pub expires_at: i64,
    /// The subject's keys (`jwks`).
    pub keys: JwkSet,
    /// Audience (`aud`), if any.
    pub audience: Option<Vec<String>>,
    /// Metadata per entity type.
    pub metadata: BTreeMap<EntityType, Map<String, Value>>,
    /// Metadata policy per entity type.
    pub metadata_policy: Option<BTreeMap<EntityType, MetadataPolicy>>,
    /// Trust chain constraints.
    pub constraints: Option<TrustChainConstraints>,
    /// Immediate superiors of the subject.
    pub authority_hints: Option<Vec<EntityId>>,
    /// Extension claims that must be understood (`crit`).
    pub critical: Vec<String>,
    /// Policy operations that must be understood (`policy_language_crit`).
    pub policy_critical_operations: Vec<String>,
    /// Any other claims, such as `jti`.
    pub other: Map<String, Value>,
}

impl EntityStatement {
    /// Decode a statement from its claims object.
    pub fn from_claims(claims: &Value) -> Result<Self> {
        let obj = claims
            .as_object()
            .ok_or_else(|| FederationError::Parse("statement claims must be a JSON object".into()))?;

        let issuer = EntityId::parse(required_str(obj, "iss")?)?;
        let subject = EntityId::parse(required_str(obj, "sub")?)?;
        let issued_at = required_time(obj, "iat")?;
        let expires_at = required_time(obj, "exp")?;
        let keys = JwkSet::parse(
            obj.get("jwks")
                .ok_or_else(|| FederationError::Parse("Missing jwks claim".into()))?,
        )?;

        let audience = match obj.get("aud") {
            None | Some(Value::Null) => None,
            Some(Value::String(aud)) => Some(vec![aud.clone()]),
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| FederationError::Parse("aud entries must be strings".into()))
                    })
                    .collect::<Result<_>>()?,
            ),
            Some(_) => return Err(FederationError::Parse("aud must be a string or array".into())),
        };

        let mut metadata = BTreeMap::new();
        if let Some(value) = obj.get("metadata") {
            for (entity_type, md) in as_object(value, "metadata")? {
                let md = md.as_object().ok_or_else(|| {
                    FederationError::Parse(format!("{entity_type} metadata must be a JSON object"))
                })?;
                metadata.insert(EntityType::new(entity_type.as_str()), md.clone());
            }
        }

        let metadata_policy = match obj.get("metadata_policy") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let mut policies = BTreeMap::new();
                for (entity_type, policy) in as_object(value, "metadata_policy")? {
                    policies.insert(
                        EntityType::new(entity_type.as_str()),
                        MetadataPolicy::parse(policy)?,
                    );
                }
                Some(policies)
            }
        };

        let constraints = match obj.get("constraints") {
            None | Some(Value::Null) => None,
            Some(value) => Some(TrustChainConstraints::parse(value)?),
        };

        let authority_hints = match obj.get("authority_hints") {
            None | Some(Value::Null) => None,
            Some(value) => Some(parse_id_list(value, "authority_hints")?),
        };

        let critical = string_list(obj, "crit")?;
        let policy_critical_operations = string_list(obj, "policy_language_crit")?;

        let other = obj
            .iter()
            .filter(|(name, _)| !REGISTERED_CLAIMS.contains(&name.as_str()))
            .map(|(name, v)| (name.clone(), v.clone()))
            .collect();

        Ok(Self {
            issuer,
            subject,
            issued_at,
            expires_at,
            keys,
            audience,
            metadata,
            metadata_policy,
            constraints,
            authority_hints,
            critical,
            policy_critical_operations,
            other,
        })
    }

    /// Decode a statement from a JSON string.
    pub fn parse_str(s: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| FederationError::Parse(e.to_string()))?;
        Self::from_claims(&value)
    }

    /// Encode back into a claims object.
    pub fn to_claims(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("iss".into(), json!(self.issuer));
        obj.insert("sub".into(), json!(self.subject));
        obj.insert("iat".into(), json!(self.issued_at));
        obj.insert("exp".into(), json!(self.expires_at));
        obj.insert("jwks".into(), self.keys.to_json());

        if let Some(aud) = &self.audience {
            let aud = match aud.as_slice() {
                [single] => json!(single),
                many => json!(many),
            };
            obj.insert("aud".into(), aud);
        }
        if !self.metadata.is_empty() {
            let md: Map<String, Value> = self
                .metadata
                .iter()
                .map(|(t, md)| (t.to_string(), Value::Object(md.clone())))
                .collect();
            obj.insert("metadata".into(), Value::Object(md));
        }
        if let Some(policies) = &self.metadata_policy {
            let mp: Map<String, Value> = policies
                .iter()
                .map(|(t, p)| (t.to_string(), p.to_json()))
                .collect();
            obj.insert("metadata_policy".into(), Value::Object(mp));
        }
        if let Some(constraints) = &self.constraints {
            obj.insert("constraints".into(), constraints.to_json());
        }
        if let Some(hints) = &self.authority_hints {
            obj.insert("authority_hints".into(), json!(hints));
        }
        if !self.critical.is_empty() {
            obj.insert("crit".into(), json!(self.critical));
        }
        if !self.policy_critical_operations.is_empty() {
            obj.insert(
                "policy_language_crit".into(),
                json!(self.policy_critical_operations),
            );
        }
        for (name, v) in &self.other {
            obj.insert(name.clone(), v.clone());
        }
        Value::Object(obj)
    }

    /// Whether this is an entity configuration (`iss == sub`).
    pub fn is_self_issued(&self) -> bool {
        self.issuer == self.subject
    }

    /// Whether any metadata is present.
    pub fn has_metadata(&self) -> bool {
        !self.metadata.is_empty()
    }

    /// Whether a claim is present, registered or not.
    pub fn has_claim(&self, name: &str) -> bool {
        match name {
            "iss" | "sub" | "iat" | "exp" | "jwks" => true,
            "aud" => self.audience.is_some(),
            "metadata" => self.has_metadata(),
            "metadata_policy" => self.metadata_policy.is_some(),
            "constraints" => self.constraints.is_some(),
            "authority_hints" => self.authority_hints.is_some(),
            "crit" => !self.critical.is_empty(),
            "policy_language_crit" => !self.policy_critical_operations.is_empty(),
            other => self.other.contains_key(other),
        }
    }

    /// Check the claims a statement of this kind must carry.
    ///
    /// A self-statement needs metadata, and every claim named in `crit`
    /// must be present.
    pub fn validate_required_claims(&self) -> Result<()> {
        if self.is_self_issued() && !self.has_metadata() {
            return Err(FederationError::Parse(
                "Missing required metadata claim for self-statement".into(),
            ));
        }
        if let Some(missing) = self.critical.iter().find(|c| !self.has_claim(c)) {
            return Err(FederationError::Parse(format!(
                "Missing critical {missing} claim"
            )));
        }
        Ok(())
    }

    /// Metadata for one entity type.
    pub fn metadata_for(&self, entity_type: &EntityType) -> Option<&Map<String, Value>> {
        self.metadata.get(entity_type)
    }

    /// Metadata policy for one entity type.
    pub fn policy_for(&self, entity_type: &EntityType) -> Option<&MetadataPolicy> {
        self.metadata_policy.as_ref()?.get(entity_type)
    }

    /// The authority hints, empty when absent.
    pub fn authority_hints(&self) -> &[EntityId] {
        self.authority_hints.as_deref().unwrap_or(&[])
    }

    /// Whether `iat <= now < exp`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.check_validity(now).is_ok()
    }

    /// Check the validity window, reporting which side failed.
    pub fn check_validity(&self, now: i64) -> Result<()> {
        if now < self.issued_at {
            return Err(FederationError::NotYetValid {
                issuer: self.issuer.clone(),
                issued_at: self.issued_at,
                now,
            });
        }
        if now >= self.expires_at {
            return Err(FederationError::Expired {
                issuer: self.issuer.clone(),
                expires_at: self.expires_at,
                now,
            });
        }
        Ok(())
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, claim: &str) -> Result<&'a str> {
    obj.get(claim)
        .ok_or_else(|| FederationError::Parse(format!("Missing {claim} claim")))?
        .as_str()
        .ok_or_else(|| FederationError::Parse(format!("{claim} must be a string")))
}

fn required_time(obj: &Map<String, Value>, claim: &str) -> Result<i64> {
    obj.get(claim)
        .ok_or_else(|| FederationError::Parse(format!("Missing {claim} claim")))?
        .as_i64()
        .ok_or_else(|| FederationError::Parse(format!("{claim} must be an integer")))
}

fn as_object<'a>(value: &'a Value, claim: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| FederationError::Parse(format!("{claim} must be a JSON object")))
}

fn string_list(obj: &Map<String, Value>, claim: &str) -> Result<Vec<String>> {
    match obj.get(claim) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| FederationError::Parse(format!("{claim} entries must be strings")))
            })
            .collect(),
        Some(_) => Err(FederationError::Parse(format!("{claim} must be a JSON array"))),
    }
}
