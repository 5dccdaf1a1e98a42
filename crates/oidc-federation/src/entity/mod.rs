//! Federation entities: identifiers, types, statements and constraints.

pub mod constraints;
pub mod id;
pub mod statement;
pub mod types;

pub use constraints::TrustChainConstraints;
pub use id::EntityId;
pub use statement::EntityStatement;
pub use types::{EntityType, REGISTERED_ENTITY_TYPES};
