//! Merging the metadata policies of a trust chain into one effective policy.
//!
//! Statements are folded anchor first, the leaf's immediate superior last.
//! A subordinate may narrow what its superiors allow but never contradict
//! it:
//!
//! | operation     | combined as            | conflict                              |
//! |---------------|------------------------|---------------------------------------|
//! | `value`       | first one fixes it     | a different value                     |
//! | `one_of`      | intersection           | empty intersection                    |
//! | `subset_of`   | intersection           | empty intersection                    |
//! | `superset_of` | union                  | outside `subset_of`/`one_of`          |
//! | `add`         | de-duplicated union    | -                                     |
//! | `default`     | most subordinate wins  | final default breaks another operator |
//! | `essential`   | logical OR             | -                                     |
//!
//! Any conflict aborts the merge.

use serde_json::Value;

use crate::entity::{EntityStatement, EntityType};
use crate::error::{PolicyViolation, PolicyViolationKind, Result};

use super::metadata_policy::{MetadataPolicy, MetadataPolicyEntry};
use super::operation::{is_recognized, OperationKind, PolicyOperation, ValueList};

/// Merges the policies a chain's authorities set for one entity type.
#[derive(Debug, Clone)]
pub struct MetadataPolicyEngine {
    entity_type: EntityType,
}

impl MetadataPolicyEngine {
    pub fn new(entity_type: EntityType) -> Self {
        Self { entity_type }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Merge the policies of `statements`, ordered anchor first and
    /// excluding the leaf's own configuration.
    ///
    /// Every statement's `policy_language_crit` is checked, including
    /// statements without a policy for this entity type.
    pub fn merge(&self, statements: &[EntityStatement]) -> Result<MetadataPolicy> {
        let mut merger = PolicyMerger::new();
        for statement in statements {
            merger.require_supported(&statement.policy_critical_operations)?;
            if let Some(policy) = statement.policy_for(&self.entity_type) {
                log::debug!(
                    "merging {} policy from {} about {}",
                    self.entity_type,
                    statement.issuer,
                    statement.subject
                );
                merger.fold(policy)?;
            }
        }
        merger.finish()
    }
}

/// Merge bare policies, superior first.
pub fn merge_policies<'a, I>(policies: I) -> Result<MetadataPolicy>
where
    I: IntoIterator<Item = &'a MetadataPolicy>,
{
    let mut merger = PolicyMerger::new();
    for policy in policies {
        merger.fold(policy)?;
    }
    merger.finish()
}

/// Incremental merge state.
#[derive(Debug, Default)]
struct PolicyMerger {
    parameters: Vec<Accumulator>,
}

/// Running combination of one parameter's operations.
#[derive(Debug)]
struct Accumulator {
    parameter: String,
    value: Option<Value>,
    add: Option<Vec<Value>>,
    default: Option<Value>,
    one_of: Option<Vec<Value>>,
    subset_of: Option<Vec<Value>>,
    superset_of: Option<Vec<Value>>,
    essential: Option<bool>,
    unknown: Vec<(String, Value)>,
}

impl PolicyMerger {
    fn new() -> Self {
        Self::default()
    }

    fn require_supported(&self, critical: &[String]) -> Result<()> {
        match critical.iter().find(|name| !is_recognized(name)) {
            Some(name) => Err(PolicyViolation::new(
                "",
                name.as_str(),
                PolicyViolationKind::UnsupportedCriticalOperation,
                format!("critical policy operation '{name}' is not supported"),
            )
            .into()),
            None => Ok(()),
        }
    }

    fn fold(&mut self, policy: &MetadataPolicy) -> Result<()> {
        for entry in policy.entries() {
            let acc = self.accumulator(&entry.parameter);
            for op in &entry.operations {
                acc.combine(op)?;
            }
            acc.check_consistency()?;
        }
        Ok(())
    }

    fn accumulator(&mut self, parameter: &str) -> &mut Accumulator {
        let idx = match self.parameters.iter().position(|a| a.parameter == parameter) {
            Some(idx) => idx,
            None => {
                self.parameters.push(Accumulator::new(parameter));
                self.parameters.len() - 1
            }
        };
        &mut self.parameters[idx]
    }

    fn finish(self) -> Result<MetadataPolicy> {
        let mut policy = MetadataPolicy::new();
        for acc in self.parameters {
            acc.check_default()?;
            policy.put_entry(acc.into_entry());
        }
        Ok(policy)
    }
}

impl Accumulator {
    fn new(parameter: &str) -> Self {
        Self {
            parameter: parameter.to_string(),
            value: None,
            add: None,
            default: None,
            one_of: None,
            subset_of: None,
            superset_of: None,
            essential: None,
            unknown: Vec::new(),
        }
    }

    fn violation(
        &self,
        kind: OperationKind,
        violation: PolicyViolationKind,
        detail: String,
    ) -> PolicyViolation {
        PolicyViolation::new(self.parameter.as_str(), kind.name(), violation, detail)
    }

    fn combine(&mut self, op: &PolicyOperation) -> Result<()> {
        match op {
            PolicyOperation::Value(v) => {
                if let Some(fixed) = &self.value {
                    if fixed != v {
                        return Err(self
                            .violation(
                                OperationKind::Value,
                                PolicyViolationKind::ConflictingValue,
                                format!("{v} conflicts with {fixed}"),
                            )
                            .into());
                    }
                } else {
                    self.value = Some(v.clone());
                }
            }
            PolicyOperation::Add(list) => {
                let add = self.add.get_or_insert_with(Vec::new);
                union_into(add, list.values());
            }
            PolicyOperation::Default(v) => self.default = Some(v.clone()),
            PolicyOperation::OneOf(list) => {
                self.one_of = Some(self.narrow(OperationKind::OneOf, &self.one_of, list)?);
            }
            PolicyOperation::SubsetOf(list) => {
                self.subset_of =
                    Some(self.narrow(OperationKind::SubsetOf, &self.subset_of, list)?);
            }
            PolicyOperation::SupersetOf(list) => {
                let required = self.superset_of.get_or_insert_with(Vec::new);
                union_into(required, list.values());
            }
            PolicyOperation::Essential(e) => {
                self.essential = Some(self.essential.unwrap_or(false) || *e);
            }
            PolicyOperation::Unknown { name, config } => {
                match self.unknown.iter_mut().find(|(n, _)| n == name) {
                    Some(slot) => slot.1 = config.clone(),
                    None => self.unknown.push((name.clone(), config.clone())),
                }
            }
        }
        Ok(())
    }

    /// Intersect a running set with a newly folded list.
    ///
    /// The first list for a parameter is taken as given, even when empty;
    /// only an intersection with an existing set can conflict.
    fn narrow(
        &self,
        kind: OperationKind,
        running: &Option<Vec<Value>>,
        list: &ValueList,
    ) -> Result<Vec<Value>> {
        let Some(running) = running else {
            let mut first = Vec::new();
            union_into(&mut first, list.values());
            return Ok(first);
        };
        let merged: Vec<Value> = running
            .iter()
            .filter(|v| list.values().contains(*v))
            .cloned()
            .collect();
        if merged.is_empty() {
            return Err(self
                .violation(
                    kind,
                    PolicyViolationKind::EmptyIntersection,
                    format!("combined {kind} allows no value"),
                )
                .into());
        }
        Ok(merged)
    }

    /// The constraints that must hold after every folded statement.
    fn check_consistency(&self) -> Result<()> {
        if let Some(required) = &self.superset_of {
            for (kind, allowed) in [
                (OperationKind::SubsetOf, &self.subset_of),
                (OperationKind::OneOf, &self.one_of),
            ] {
                if let Some(allowed) = allowed {
                    if let Some(outside) = required.iter().find(|v| !allowed.contains(*v)) {
                        return Err(self
                            .violation(
                                OperationKind::SupersetOf,
                                PolicyViolationKind::UnsatisfiableSuperset,
                                format!("required {outside} is not allowed by {kind}"),
                            )
                            .into());
                    }
                }
            }
        }

        if let Some(value) = self.value.as_ref().filter(|v| !v.is_null()) {
            if let Some(reason) = self.rejects(value) {
                return Err(self
                    .violation(
                        OperationKind::Value,
                        PolicyViolationKind::ConflictingValue,
                        format!("fixed value {value} {reason}"),
                    )
                    .into());
            }
        }

        Ok(())
    }

    fn check_default(&self) -> Result<()> {
        if let Some(default) = &self.default {
            if let Some(reason) = self.rejects(default) {
                return Err(self
                    .violation(
                        OperationKind::Default,
                        PolicyViolationKind::InconsistentDefault,
                        format!("default {default} {reason}"),
                    )
                    .into());
            }
        }
        Ok(())
    }

    /// Why the set-valued operators reject a value, if they do.
    fn rejects(&self, value: &Value) -> Option<String> {
        if let Some(one_of) = &self.one_of {
            if !one_of.contains(value) {
                return Some("is not one of the allowed values".into());
            }
        }
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            scalar => vec![scalar],
        };
        if let Some(subset_of) = &self.subset_of {
            if let Some(extra) = items.iter().find(|v| !subset_of.contains(**v)) {
                return Some(format!("contains {extra} outside subset_of"));
            }
        }
        if let Some(superset_of) = &self.superset_of {
            if let Some(missing) = superset_of.iter().find(|v| !items.contains(v)) {
                return Some(format!("lacks {missing} required by superset_of"));
            }
        }
        None
    }

    fn into_entry(self) -> MetadataPolicyEntry {
        let mut entry = MetadataPolicyEntry::new(self.parameter);
        if let Some(v) = self.value {
            entry.put(PolicyOperation::Value(v));
        }
        if let Some(add) = self.add {
            entry.put(PolicyOperation::Add(ValueList::new(add)));
        }
        if let Some(d) = self.default {
            entry.put(PolicyOperation::Default(d));
        }
        if let Some(one_of) = self.one_of {
            entry.put(PolicyOperation::OneOf(ValueList::new(one_of)));
        }
        if let Some(subset_of) = self.subset_of {
            entry.put(PolicyOperation::SubsetOf(ValueList::new(subset_of)));
        }
        if let Some(superset_of) = self.superset_of {
            entry.put(PolicyOperation::SupersetOf(ValueList::new(superset_of)));
        }
        if let Some(e) = self.essential {
            entry.put(PolicyOperation::Essential(e));
        }
        for (name, config) in self.unknown {
            entry.put(PolicyOperation::Unknown { name, config });
        }
        entry
    }
}

fn union_into(target: &mut Vec<Value>, values: &[Value]) {
    for v in values {
        if !target.contains(v) {
            target.push(v.clone());
        }
    }
}
