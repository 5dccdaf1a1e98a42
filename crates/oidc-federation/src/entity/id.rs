//! Entity identifiers and prefix matching.
//!
//! An entity identifier is an absolute URI, parsed with `url`. Identifiers
//! compare by exact string equality of the serialized URL after trailing
//! slashes are stripped, so `https://example.com/` and `https://example.com`
//! name the same entity.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::{FederationError, Result};

/// A normalized federation entity identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    /// Parse and normalize an entity identifier.
    ///
    /// The value must be an absolute URI with a host and no query or
    /// fragment. Whitespace and control characters are rejected rather than
    /// stripped.
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref().trim();
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(FederationError::Parse(format!(
                "entity id contains whitespace or control characters: {value:?}"
            )));
        }

        let url = Url::parse(value).map_err(|e| {
            FederationError::Parse(format!("entity id is not an absolute URI: {value}: {e}"))
        })?;
        if !url.has_host() || url.host_str().is_some_and(str::is_empty) {
            return Err(FederationError::Parse(format!(
                "entity id has no authority: {value}"
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(FederationError::Parse(format!(
                "entity id must not carry a query or fragment: {value}"
            )));
        }

        Ok(Self(url.as_str().trim_end_matches('/').to_string()))
    }

    /// The normalized identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this identifier falls under `prefix`.
    ///
    /// `x` matches `p` when `x == p`, or when `x` starts with `p` and the
    /// next character is `/`. `https://example.com` therefore covers
    /// `https://example.com/rp` but not `https://example.community`.
    pub fn matches_prefix(&self, prefix: &EntityId) -> bool {
        if self.0 == prefix.0 {
            return true;
        }
        self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/')
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = FederationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        EntityId::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Parse a JSON array of strings into entity identifiers.
pub(crate) fn parse_id_list(value: &serde_json::Value, claim: &str) -> Result<Vec<EntityId>> {
    let items = value
        .as_array()
        .ok_or_else(|| FederationError::Parse(format!("{claim} must be a JSON array")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| FederationError::Parse(format!("{claim} entries must be strings")))
                .and_then(EntityId::parse)
        })
        .collect()
}
