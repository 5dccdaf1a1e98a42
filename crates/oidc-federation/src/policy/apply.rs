//! Applying an effective metadata policy to self-asserted metadata.
//!
//! For each parameter named by the policy:
//!
//! 1. `value` replaces the parameter (`null` removes it)
//! 2. otherwise `add` extends an array parameter, starting from `[]`
//! 3. otherwise `default` fills an absent parameter
//! 4. the result is checked against `one_of`, `subset_of` and
//!    `superset_of`, in that order
//! 5. an absent `essential` parameter is an error
//!
//! Parameters the policy does not name pass through unchanged.

use serde_json::{Map, Value};

use crate::error::{PolicyViolation, PolicyViolationKind, Result};

use super::metadata_policy::{MetadataPolicy, MetadataPolicyEntry};
use super::operation::{OperationKind, PolicyOperation};

/// How a policy entry treats a parameter the metadata does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsentParameterRule {
    /// The entry does nothing unless it has `value`, `add`, `default` or
    /// `essential: true`. Checks such as `subset_of` never create a
    /// parameter.
    #[default]
    InertUnlessSynthesizing,
}

impl AbsentParameterRule {
    /// Whether an entry acts on a parameter missing from the metadata.
    pub fn applies_to_absent(self, entry: &MetadataPolicyEntry) -> bool {
        match self {
            AbsentParameterRule::InertUnlessSynthesizing => {
                entry.operations.iter().any(|op| match op {
                    PolicyOperation::Value(_)
                    | PolicyOperation::Add(_)
                    | PolicyOperation::Default(_) => true,
                    PolicyOperation::Essential(essential) => *essential,
                    PolicyOperation::OneOf(_)
                    | PolicyOperation::SubsetOf(_)
                    | PolicyOperation::SupersetOf(_)
                    | PolicyOperation::Unknown { .. } => false,
                })
            }
        }
    }
}

/// Apply a policy to a metadata object, producing a new object.
pub fn apply_policy(
    policy: &MetadataPolicy,
    metadata: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    apply_policy_with(policy, metadata, AbsentParameterRule::default())
}

/// Apply a policy with an explicit absent-parameter rule.
pub fn apply_policy_with(
    policy: &MetadataPolicy,
    metadata: &Map<String, Value>,
    rule: AbsentParameterRule,
) -> Result<Map<String, Value>> {
    let mut out = metadata.clone();

    for entry in policy.entries() {
        let parameter = entry.parameter.as_str();
        if !out.contains_key(parameter) && !rule.applies_to_absent(entry) {
            continue;
        }

        let current = out.get(parameter).cloned();
        match apply_entry(entry, current)? {
            Some(v) => {
                out.insert(parameter.to_string(), v);
            }
            None => {
                out.shift_remove(parameter);
                if let Some(PolicyOperation::Essential(true)) =
                    entry.operation(OperationKind::Essential)
                {
                    return Err(PolicyViolation::new(
                        parameter,
                        OperationKind::Essential.name(),
                        PolicyViolationKind::EssentialMissing,
                        "essential parameter is absent",
                    )
                    .into());
                }
            }
        }
    }

    Ok(out)
}

fn apply_entry(entry: &MetadataPolicyEntry, current: Option<Value>) -> Result<Option<Value>> {
    let parameter = entry.parameter.as_str();

    let value = if let Some(PolicyOperation::Value(v)) = entry.operation(OperationKind::Value) {
        if v.is_null() {
            None
        } else {
            Some(v.clone())
        }
    } else if let Some(PolicyOperation::Add(add)) = entry.operation(OperationKind::Add) {
        let mut items = match current {
            None => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(PolicyViolation::new(
                    parameter,
                    OperationKind::Add.name(),
                    PolicyViolationKind::InvalidParameterType,
                    "add requires an array parameter",
                )
                .into())
            }
        };
        for v in add.values() {
            if !items.contains(v) {
                items.push(v.clone());
            }
        }
        Some(Value::Array(items))
    } else {
        match (current, entry.operation(OperationKind::Default)) {
            (None, Some(PolicyOperation::Default(d))) => Some(d.clone()),
            (current, _) => current,
        }
    };

    if let Some(v) = &value {
        check(entry, v)?;
    }
    Ok(value)
}

/// Run `one_of`, `subset_of` and `superset_of` against a present value.
fn check(entry: &MetadataPolicyEntry, value: &Value) -> Result<()> {
    let parameter = entry.parameter.as_str();

    if let Some(PolicyOperation::OneOf(allowed)) = entry.operation(OperationKind::OneOf) {
        if value.is_array() {
            return Err(PolicyViolation::new(
                parameter,
                OperationKind::OneOf.name(),
                PolicyViolationKind::InvalidParameterType,
                "one_of requires a single value",
            )
            .into());
        }
        if !allowed.values().contains(value) {
            return Err(PolicyViolation::new(
                parameter,
                OperationKind::OneOf.name(),
                PolicyViolationKind::ValueNotAllowed,
                format!("{value} is not one of {}", Value::from(allowed.values().to_vec())),
            )
            .into());
        }
    }

    let items = as_set(value);

    if let Some(PolicyOperation::SubsetOf(allowed)) = entry.operation(OperationKind::SubsetOf) {
        if let Some(extra) = items.iter().find(|v| !allowed.values().contains(**v)) {
            return Err(PolicyViolation::new(
                parameter,
                OperationKind::SubsetOf.name(),
                PolicyViolationKind::ValueNotAllowed,
                format!("{extra} is not allowed"),
            )
            .into());
        }
    }

    if let Some(PolicyOperation::SupersetOf(required)) = entry.operation(OperationKind::SupersetOf)
    {
        let missing: Vec<Value> = required
            .values()
            .iter()
            .filter(|v| !items.contains(v))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PolicyViolation::new(
                parameter,
                OperationKind::SupersetOf.name(),
                PolicyViolationKind::MissingRequiredValues,
                format!("missing {}", Value::Array(missing)),
            )
            .into());
        }
    }

    Ok(())
}

/// A scalar counts as a one-element set.
fn as_set(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        scalar => vec![scalar],
    }
}
