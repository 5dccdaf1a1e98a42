//! Policy operations: the closed set of metadata policy operators.
//!
//! Operation names:
//!   - `value`: force the parameter to a value
//!   - `default`: value to use when the parameter is absent
//!   - `add`: values to add to an array parameter
//!   - `one_of`: the parameter must equal one of the listed values
//!   - `subset_of`: the parameter's values must all be listed
//!   - `superset_of`: the parameter must contain all listed values
//!   - `essential`: the parameter must be present
//!
//! Anything else parses as [`PolicyOperation::Unknown`] so that it can be
//! round-tripped, and rejected only when a statement marks it critical.

use serde_json::Value;

use crate::error::{FederationError, Result};

fn malformed(parameter: &str, operation: &str, detail: &str) -> FederationError {
    FederationError::Parse(format!(
        "invalid {operation} configuration for {parameter}: {detail}"
    ))
}

/// Operation names recognized by the engine.
///
/// Read-only for the life of the process.
pub const RECOGNIZED_OPERATIONS: &[&str] = &[
    OperationKind::Value.name(),
    OperationKind::Default.name(),
    OperationKind::Add.name(),
    OperationKind::OneOf.name(),
    OperationKind::SubsetOf.name(),
    OperationKind::SupersetOf.name(),
    OperationKind::Essential.name(),
];

/// Whether an operation name is one the engine implements.
pub fn is_recognized(name: &str) -> bool {
    RECOGNIZED_OPERATIONS.contains(&name)
}

/// The kind of a policy operation, without its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Value,
    Default,
    Add,
    OneOf,
    SubsetOf,
    SupersetOf,
    Essential,
    Unknown,
}

impl OperationKind {
    /// The JSON operation name (`"unknown"` for the catch-all).
    pub const fn name(self) -> &'static str {
        match self {
            OperationKind::Value => "value",
            OperationKind::Default => "default",
            OperationKind::Add => "add",
            OperationKind::OneOf => "one_of",
            OperationKind::SubsetOf => "subset_of",
            OperationKind::SupersetOf => "superset_of",
            OperationKind::Essential => "essential",
            OperationKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// List configuration of `add`, `one_of`, `subset_of` and `superset_of`.
///
/// A single scalar config (`"add": "helpdesk@example.org"`) is accepted as
/// a one-element list and written back as a scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueList {
    values: Vec<Value>,
    scalar: bool,
}

impl ValueList {
    /// A list written as a JSON array.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            scalar: false,
        }
    }

    /// A single value written as a bare scalar.
    pub fn scalar(value: Value) -> Self {
        Self {
            values: vec![value],
            scalar: true,
        }
    }

    /// Build from string items.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    fn parse(parameter: &str, operation: &str, config: &Value) -> Result<Self> {
        match config {
            Value::Array(items) => Ok(Self::new(items.clone())),
            Value::Object(_) | Value::Null => Err(malformed(
                parameter,
                operation,
                "expected a JSON array or scalar",
            )),
            scalar => Ok(Self::scalar(scalar.clone())),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn to_json(&self) -> Value {
        match (self.scalar, self.values.as_slice()) {
            (true, [single]) => single.clone(),
            _ => Value::Array(self.values.clone()),
        }
    }
}

/// A metadata policy operation with its typed configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOperation {
    Value(Value),
    Default(Value),
    Add(ValueList),
    OneOf(ValueList),
    SubsetOf(ValueList),
    SupersetOf(ValueList),
    Essential(bool),
    Unknown { name: String, config: Value },
}

impl PolicyOperation {
    /// Parse one operation of a parameter's policy.
    ///
    /// A configuration of the wrong JSON shape is a parse error.
    pub fn parse(parameter: &str, name: &str, config: &Value) -> Result<Self> {
        let op = match name {
            "value" => PolicyOperation::Value(config.clone()),
            "default" => {
                if config.is_null() {
                    return Err(malformed(parameter, name, "default must not be null"));
                }
                PolicyOperation::Default(config.clone())
            }
            "add" => PolicyOperation::Add(ValueList::parse(parameter, name, config)?),
            "one_of" => PolicyOperation::OneOf(ValueList::parse(parameter, name, config)?),
            "subset_of" => PolicyOperation::SubsetOf(ValueList::parse(parameter, name, config)?),
            "superset_of" => {
                PolicyOperation::SupersetOf(ValueList::parse(parameter, name, config)?)
            }
            "essential" => match config {
                Value::Bool(b) => PolicyOperation::Essential(*b),
                _ => return Err(malformed(parameter, name, "essential must be a boolean")),
            },
            other => PolicyOperation::Unknown {
                name: other.to_string(),
                config: config.clone(),
            },
        };
        Ok(op)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            PolicyOperation::Value(_) => OperationKind::Value,
            PolicyOperation::Default(_) => OperationKind::Default,
            PolicyOperation::Add(_) => OperationKind::Add,
            PolicyOperation::OneOf(_) => OperationKind::OneOf,
            PolicyOperation::SubsetOf(_) => OperationKind::SubsetOf,
            PolicyOperation::SupersetOf(_) => OperationKind::SupersetOf,
            PolicyOperation::Essential(_) => OperationKind::Essential,
            PolicyOperation::Unknown { .. } => OperationKind::Unknown,
        }
    }

    /// The JSON operation name, the original name for unknown operations.
    pub fn name(&self) -> &str {
        match self {
            PolicyOperation::Unknown { name, .. } => name,
            other => other.kind().name(),
        }
    }

    /// The JSON configuration.
    pub fn config_json(&self) -> Value {
        match self {
            PolicyOperation::Value(v) | PolicyOperation::Default(v) => v.clone(),
            PolicyOperation::Add(list)
            | PolicyOperation::OneOf(list)
            | PolicyOperation::SubsetOf(list)
            | PolicyOperation::SupersetOf(list) => list.to_json(),
            PolicyOperation::Essential(b) => Value::Bool(*b),
            PolicyOperation::Unknown { config, .. } => config.clone(),
        }
    }

    /// Whether two operations occupy the same slot of a parameter.
    ///
    /// Unknown operations are distinguished by name.
    pub fn same_slot(&self, other: &PolicyOperation) -> bool {
        self.kind() == other.kind() && self.name() == other.name()
    }
}
