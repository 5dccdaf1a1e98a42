//! Entity types: the keys of the `metadata` and `metadata_policy` claims.

use serde::{Deserialize, Serialize};

/// Entity type keys registered by OpenID Connect Federation.
///
/// Read-only for the life of the process.
pub const REGISTERED_ENTITY_TYPES: &[&str] = &[
    EntityType::OPENID_RELYING_PARTY,
    EntityType::OPENID_PROVIDER,
    EntityType::OAUTH_AUTHORIZATION_SERVER,
    EntityType::OAUTH_CLIENT,
    EntityType::FEDERATION_ENTITY,
];

/// A metadata type key such as `openid_relying_party`.
///
/// Unregistered keys are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(pub String);

impl EntityType {
    pub const OPENID_RELYING_PARTY: &'static str = "openid_relying_party";
    pub const OPENID_PROVIDER: &'static str = "openid_provider";
    pub const OAUTH_AUTHORIZATION_SERVER: &'static str = "oauth_authorization_server";
    pub const OAUTH_CLIENT: &'static str = "oauth_client";
    pub const FEDERATION_ENTITY: &'static str = "federation_entity";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn openid_relying_party() -> Self {
        Self::new(Self::OPENID_RELYING_PARTY)
    }

    pub fn openid_provider() -> Self {
        Self::new(Self::OPENID_PROVIDER)
    }

    pub fn oauth_authorization_server() -> Self {
        Self::new(Self::OAUTH_AUTHORIZATION_SERVER)
    }

    pub fn oauth_client() -> Self {
        Self::new(Self::OAUTH_CLIENT)
    }

    pub fn federation_entity() -> Self {
        Self::new(Self::FEDERATION_ENTITY)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key is one of [`REGISTERED_ENTITY_TYPES`].
    pub fn is_registered(&self) -> bool {
        REGISTERED_ENTITY_TYPES.contains(&self.0.as_str())
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
