//! Error types for oidc-federation.
//!
//! All errors are strongly typed and propagated without panicking.
//! Per-hint failures during chain resolution are recovered by
//! backtracking; only the terminal failure of a resolution reaches the
//! caller.

use crate::entity::EntityId;
use crate::resolve::state::ResolutionState;

/// Federation error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("Statement from {issuer} expired at {expires_at} (now {now})")]
    Expired {
        issuer: EntityId,
        expires_at: i64,
        now: i64,
    },

    #[error("Statement from {issuer} not valid before {issued_at} (now {now})")]
    NotYetValid {
        issuer: EntityId,
        issued_at: i64,
        now: i64,
    },

    #[error("Constraint violation: {0}")]
    Constraint(#[from] ConstraintViolation),

    #[error("Policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    #[error("Cycle detected: {0} already appears in the chain")]
    CycleDetected(EntityId),

    #[error("Hop limit of {0} statements reached")]
    HopLimitExceeded(usize),

    #[error("Statement mismatch: {0}")]
    StatementMismatch(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("No metadata for entity type {0}")]
    MetadataNotFound(String),

    #[error("No trust path from {leaf} to {anchor}")]
    NoTrustPath { leaf: EntityId, anchor: EntityId },

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FederationError {
    /// The terminal resolution state this error leaves a resolution in.
    pub fn resolution_state(&self) -> ResolutionState {
        match self {
            FederationError::Constraint(_) | FederationError::HopLimitExceeded(_) => {
                ResolutionState::ConstraintViolation
            }
            FederationError::SignatureInvalid(_) | FederationError::InvalidKey(_) => {
                ResolutionState::SignatureInvalid
            }
            FederationError::Expired { .. } | FederationError::NotYetValid { .. } => {
                ResolutionState::Expired
            }
            FederationError::CycleDetected(_) => ResolutionState::CycleDetected,
            FederationError::Policy(_) | FederationError::MetadataNotFound(_) => {
                ResolutionState::PolicyConflict
            }
            _ => ResolutionState::NoPath,
        }
    }
}

/// A violated trust chain constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintViolation {
    #[error("max_path_length {max} exceeded by {entity}")]
    MaxPathLengthExceeded { entity: EntityId, max: u32 },

    #[error("{entity} matches no permitted naming constraint")]
    NamingConstraintPermitted { entity: EntityId },

    #[error("{entity} matches excluded naming constraint {prefix}")]
    NamingConstraintExcluded { entity: EntityId, prefix: EntityId },
}

/// Kind of metadata policy violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolationKind {
    /// Two statements fix different `value`s.
    ConflictingValue,
    /// Combined `one_of` or `subset_of` lists share no element.
    EmptyIntersection,
    /// Required `superset_of` values fall outside the allowed set.
    UnsatisfiableSuperset,
    /// The effective `default` breaks another operation of the entry.
    InconsistentDefault,
    /// A critical policy operation is not supported.
    UnsupportedCriticalOperation,
    /// An `essential` parameter is missing from the metadata.
    EssentialMissing,
    /// A metadata value is outside the allowed values.
    ValueNotAllowed,
    /// A metadata value is missing required values.
    MissingRequiredValues,
    /// The metadata value has the wrong JSON type for the operation.
    InvalidParameterType,
}

impl std::fmt::Display for PolicyViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PolicyViolationKind::ConflictingValue => "conflicting value",
            PolicyViolationKind::EmptyIntersection => "empty intersection",
            PolicyViolationKind::UnsatisfiableSuperset => "unsatisfiable superset",
            PolicyViolationKind::InconsistentDefault => "inconsistent default",
            PolicyViolationKind::UnsupportedCriticalOperation => "unsupported critical operation",
            PolicyViolationKind::EssentialMissing => "essential parameter missing",
            PolicyViolationKind::ValueNotAllowed => "value not allowed",
            PolicyViolationKind::MissingRequiredValues => "missing required values",
            PolicyViolationKind::InvalidParameterType => "invalid parameter type",
        };
        f.write_str(s)
    }
}

/// A metadata policy violation raised by merging or applying a policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} for parameter '{parameter}' ({operation}): {detail}")]
pub struct PolicyViolation {
    /// The metadata parameter the violation concerns.
    pub parameter: String,
    /// The operation name involved, e.g. `one_of`.
    pub operation: String,
    /// What went wrong.
    pub kind: PolicyViolationKind,
    /// Human-readable detail.
    pub detail: String,
}

impl PolicyViolation {
    pub fn new(
        parameter: impl Into<String>,
        operation: impl Into<String>,
        kind: PolicyViolationKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            operation: operation.into(),
            kind,
            detail: detail.into(),
        }
    }
}

/// Error reported by a [`Fetcher`](crate::resolve::Fetcher).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("no statement issued by {issuer} about {subject}")]
    NotFound { issuer: EntityId, subject: EntityId },

    #[error("fetch timed out")]
    Timeout,

    #[error("fetch cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, FederationError>;
