//! Metadata policies: per-parameter operation lists.
//!
//! ```json
//! {
//!   "scopes": {"subset_of": ["openid", "eduperson"], "default": ["openid"]},
//!   "contacts": {"add": "helpdesk@federation.example.org"},
//!   "application_type": {"value": "web"}
//! }
//! ```
//!
//! Entries keep insertion order for serialization. Within one parameter
//! there is at most one operation of each kind; inserting another of the
//! same kind replaces it.

use serde_json::{Map, Value};

use crate::error::{FederationError, Result};

use super::operation::{OperationKind, PolicyOperation};

/// The policy for one metadata parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataPolicyEntry {
    /// The metadata parameter name.
    pub parameter: String,
    /// The operations on the parameter.
    pub operations: Vec<PolicyOperation>,
}

impl MetadataPolicyEntry {
    pub fn new(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            operations: Vec::new(),
        }
    }

    /// Find the operation of a given kind.
    pub fn operation(&self, kind: OperationKind) -> Option<&PolicyOperation> {
        self.operations.iter().find(|op| op.kind() == kind)
    }

    /// Insert an operation, replacing one of the same kind.
    pub fn put(&mut self, op: PolicyOperation) {
        match self.operations.iter_mut().find(|existing| existing.same_slot(&op)) {
            Some(existing) => *existing = op,
            None => self.operations.push(op),
        }
    }

    fn to_json(&self) -> Value {
        let ops: Map<String, Value> = self
            .operations
            .iter()
            .map(|op| (op.name().to_string(), op.config_json()))
            .collect();
        Value::Object(ops)
    }
}

/// A metadata policy for one entity type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPolicy {
    entries: Vec<MetadataPolicyEntry>,
}

impl MetadataPolicy {
    /// An empty policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a policy from its JSON object form.
    pub fn parse(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| FederationError::Parse("metadata policy must be a JSON object".into()))?;

        let mut policy = Self::new();
        for (parameter, ops) in obj {
            let ops = ops.as_object().ok_or_else(|| {
                FederationError::Parse(format!(
                    "policy for parameter {parameter} must be a JSON object"
                ))
            })?;
            let mut entry = MetadataPolicyEntry::new(parameter.as_str());
            for (name, config) in ops {
                entry.put(PolicyOperation::parse(parameter, name, config)?);
            }
            policy.put_entry(entry);
        }
        Ok(policy)
    }

    /// Parse a policy from a JSON string.
    pub fn parse_str(s: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| FederationError::Parse(e.to_string()))?;
        Self::parse(&value)
    }

    /// Serialize to the JSON object form.
    pub fn to_json(&self) -> Value {
        let obj: Map<String, Value> = self
            .entries
            .iter()
            .map(|e| (e.parameter.clone(), e.to_json()))
            .collect();
        Value::Object(obj)
    }

    /// Serialize to a JSON string.
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// The operations on a parameter.
    pub fn get(&self, parameter: &str) -> Option<&[PolicyOperation]> {
        self.get_entry(parameter).map(|e| e.operations.as_slice())
    }

    /// The entry for a parameter.
    pub fn get_entry(&self, parameter: &str) -> Option<&MetadataPolicyEntry> {
        self.entries.iter().find(|e| e.parameter == parameter)
    }

    /// Add an operation to a parameter, replacing one of the same kind.
    pub fn put(&mut self, parameter: impl Into<String>, op: PolicyOperation) {
        let parameter = parameter.into();
        match self.entries.iter_mut().find(|e| e.parameter == parameter) {
            Some(entry) => entry.put(op),
            None => {
                let mut entry = MetadataPolicyEntry::new(parameter);
                entry.put(op);
                self.entries.push(entry);
            }
        }
    }

    /// Insert or replace a whole entry.
    pub fn put_entry(&mut self, entry: MetadataPolicyEntry) {
        match self.entries.iter_mut().find(|e| e.parameter == entry.parameter) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove a parameter's policy, returning its operations.
    pub fn remove(&mut self, parameter: &str) -> Option<Vec<PolicyOperation>> {
        let idx = self.entries.iter().position(|e| e.parameter == parameter)?;
        Some(self.entries.remove(idx).operations)
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &MetadataPolicyEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Apply this policy to a metadata object.
    ///
    /// See [`apply_policy`](super::apply::apply_policy).
    pub fn apply(&self, metadata: &Map<String, Value>) -> Result<Map<String, Value>> {
        super::apply::apply_policy(self, metadata)
    }
}
