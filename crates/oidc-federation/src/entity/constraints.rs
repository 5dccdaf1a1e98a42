//! Trust chain constraints: path length and naming limits.
//!
//! Constraints appear in a statement a superior issues about a
//! subordinate:
//!
//! ```json
//! {
//!   "max_path_length": 2,
//!   "naming_constraints": {
//!     "permitted": ["https://example.com"],
//!     "excluded": ["https://east.example.com"]
//!   }
//! }
//! ```
//!
//! `max_path_length` bounds the number of entities between the statement's
//! subject and the trust anchor. Naming constraints restrict which entity
//! identifiers may appear below the subject in a chain.

use serde_json::{json, Map, Value};

use crate::error::{ConstraintViolation, FederationError, Result};

use super::id::{parse_id_list, EntityId};

/// Constraints on a trust chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustChainConstraints {
    /// Maximum entities between the subject and the anchor (None = unset).
    pub max_path_length: Option<u32>,
    /// Permitted entity prefixes (None = anything permitted).
    pub permitted: Option<Vec<EntityId>>,
    /// Excluded entity prefixes (None = nothing excluded).
    pub excluded: Option<Vec<EntityId>>,
}

impl TrustChainConstraints {
    /// Constraints that limit nothing.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Set the max path length.
    pub fn with_max_path_length(mut self, max: u32) -> Self {
        self.max_path_length = Some(max);
        self
    }

    /// Set the permitted prefixes.
    pub fn with_permitted(mut self, permitted: Vec<EntityId>) -> Self {
        self.permitted = Some(permitted);
        self
    }

    /// Set the excluded prefixes.
    pub fn with_excluded(mut self, excluded: Vec<EntityId>) -> Self {
        self.excluded = Some(excluded);
        self
    }

    /// Parse constraints from their JSON object form.
    pub fn parse(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| FederationError::Parse("constraints must be a JSON object".into()))?;

        let max_path_length = match obj.get("max_path_length") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let n = v.as_u64().ok_or_else(|| {
                    FederationError::Parse("max_path_length must be a non-negative integer".into())
                })?;
                Some(u32::try_from(n).map_err(|_| {
                    FederationError::Parse(format!("max_path_length out of range: {n}"))
                })?)
            }
        };

        let (permitted, excluded) = match obj.get("naming_constraints") {
            None | Some(Value::Null) => (None, None),
            Some(Value::Object(naming)) => (
                naming
                    .get("permitted")
                    .map(|v| parse_id_list(v, "permitted"))
                    .transpose()?,
                naming
                    .get("excluded")
                    .map(|v| parse_id_list(v, "excluded"))
                    .transpose()?,
            ),
            Some(_) => {
                return Err(FederationError::Parse(
                    "naming_constraints must be a JSON object".into(),
                ))
            }
        };

        Ok(Self {
            max_path_length,
            permitted,
            excluded,
        })
    }

    /// Parse constraints from a JSON string.
    pub fn parse_str(s: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| FederationError::Parse(e.to_string()))?;
        Self::parse(&value)
    }

    /// Serialize to the JSON object form.
    ///
    /// An unset `max_path_length` and empty naming lists are omitted.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(max) = self.max_path_length {
            obj.insert("max_path_length".into(), json!(max));
        }

        let mut naming = Map::new();
        if let Some(permitted) = self.permitted.as_ref().filter(|p| !p.is_empty()) {
            naming.insert("permitted".into(), json!(permitted));
        }
        if let Some(excluded) = self.excluded.as_ref().filter(|e| !e.is_empty()) {
            naming.insert("excluded".into(), json!(excluded));
        }
        if !naming.is_empty() {
            obj.insert("naming_constraints".into(), Value::Object(naming));
        }

        Value::Object(obj)
    }

    /// Check an entity identifier against the naming constraints.
    ///
    /// Exclusion wins over permission: an identifier under an excluded
    /// prefix fails even when it also matches a permitted one. A present
    /// but empty permitted list permits nothing.
    pub fn check_naming(&self, entity: &EntityId) -> std::result::Result<(), ConstraintViolation> {
        if let Some(prefix) = self
            .excluded
            .iter()
            .flatten()
            .find(|p| entity.matches_prefix(p))
        {
            return Err(ConstraintViolation::NamingConstraintExcluded {
                entity: entity.clone(),
                prefix: prefix.clone(),
            });
        }

        if let Some(permitted) = &self.permitted {
            if !permitted.iter().any(|p| entity.matches_prefix(p)) {
                return Err(ConstraintViolation::NamingConstraintPermitted {
                    entity: entity.clone(),
                });
            }
        }

        Ok(())
    }
}
