//! JSON Web Keys (RFC 7517) and thumbprints (RFC 7638).
//!
//! Statements carry their issuer's keys in the `jwks` claim. Only Ed25519
//! `OKP` keys can verify signatures here; other key types are retained so
//! a key set round-trips unchanged.

use base64::Engine;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{FederationError, Result};

/// A single JSON Web Key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`OKP`, `RSA`, `EC`, ...).
    pub kty: String,

    /// Curve for `OKP`/`EC` keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// Public key material (base64url).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Intended algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Public key use (`sig` or `enc`).
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Any other members, kept for round-tripping.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Jwk {
    /// Build an Ed25519 public JWK with its thumbprint as `kid`.
    pub fn from_ed25519(key: &VerifyingKey) -> Self {
        let x = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(key.to_bytes());
        let mut jwk = Self {
            kty: "OKP".into(),
            crv: Some("Ed25519".into()),
            x: Some(x),
            kid: None,
            alg: Some("EdDSA".into()),
            key_use: Some("sig".into()),
            other: Map::new(),
        };
        jwk.kid = jwk.thumbprint().ok();
        jwk
    }

    /// Whether this is an Ed25519 signing key.
    pub fn is_ed25519(&self) -> bool {
        self.kty == "OKP"
            && self.crv.as_deref() == Some("Ed25519")
            && self.key_use.as_deref().map_or(true, |u| u == "sig")
    }

    /// Decode the Ed25519 verifying key.
    pub fn ed25519_key(&self) -> Result<VerifyingKey> {
        if !self.is_ed25519() {
            return Err(FederationError::InvalidKey(format!(
                "not an Ed25519 signing key: kty={} crv={:?}",
                self.kty, self.crv
            )));
        }
        let x = self
            .x
            .as_deref()
            .ok_or_else(|| FederationError::InvalidKey("OKP key has no x member".into()))?;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(x)
            .map_err(|e| FederationError::InvalidKey(format!("invalid base64url x: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| FederationError::InvalidKey("Ed25519 key must be 32 bytes".into()))?;
        super::keys::FederationKey::verifying_key_from_bytes(&bytes)
    }

    /// RFC 7638 thumbprint: base64url SHA-256 of the required members in
    /// lexicographic order.
    pub fn thumbprint(&self) -> Result<String> {
        let required = match self.kty.as_str() {
            "OKP" => serde_json::json!({
                "crv": self.crv,
                "kty": self.kty,
                "x": self.x,
            }),
            "EC" => serde_json::json!({
                "crv": self.crv,
                "kty": self.kty,
                "x": self.x,
                "y": self.other.get("y"),
            }),
            "RSA" => serde_json::json!({
                "e": self.other.get("e"),
                "kty": self.kty,
                "n": self.other.get("n"),
            }),
            other => {
                return Err(FederationError::InvalidKey(format!(
                    "no thumbprint rule for kty {other}"
                )))
            }
        };
        if required
            .as_object()
            .is_some_and(|o| o.values().any(Value::is_null))
        {
            return Err(FederationError::InvalidKey(
                "key is missing a required member".into(),
            ));
        }
        let digest = Sha256::digest(required.to_string().as_bytes());
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest))
    }
}

/// A JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
    /// The keys.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// An empty key set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A key set holding the given keys.
    pub fn with_keys(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// Parse from the `jwks` JSON object.
    pub fn parse(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| FederationError::Parse(format!("invalid jwks: {e}")))
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"keys": []}))
    }

    /// Find a key by its ID.
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// All Ed25519 signing keys.
    pub fn ed25519_keys(&self) -> impl Iterator<Item = &Jwk> {
        self.keys.iter().filter(|k| k.is_ed25519())
    }

    /// Whether the two sets share a key (by thumbprint).
    pub fn shares_key_with(&self, other: &JwkSet) -> bool {
        self.keys.iter().filter_map(|k| k.thumbprint().ok()).any(|t| {
            other
                .keys
                .iter()
                .filter_map(|k| k.thumbprint().ok())
                .any(|o| o == t)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}
