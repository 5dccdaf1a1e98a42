//! Metadata policy algebra.
//!
//! - [`operation`]: the closed set of policy operations
//! - [`metadata_policy`]: per-parameter policies and their JSON form
//! - [`merge`]: combining a chain's policies into one effective policy
//! - [`apply`]: applying the effective policy to leaf metadata

pub mod apply;
pub mod merge;
pub mod metadata_policy;
pub mod operation;

pub use apply::{apply_policy, apply_policy_with, AbsentParameterRule};
pub use merge::{merge_policies, MetadataPolicyEngine};
pub use metadata_policy::{MetadataPolicy, MetadataPolicyEntry};
pub use operation::{is_recognized, OperationKind, PolicyOperation, ValueList, RECOGNIZED_OPERATIONS};
