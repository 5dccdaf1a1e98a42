//! Ed25519 federation signing keys.
//!
//! A federation entity signs its statements with an Ed25519 key. The
//! public half is published as an `OKP` JWK whose `kid` is the RFC 7638
//! thumbprint.

use base64::Engine;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::{SigningKey, VerifyingKey};
use jsonwebtoken::EncodingKey;
use zeroize::Zeroize;

use crate::error::{FederationError, Result};

use super::jwk::{Jwk, JwkSet};

/// An Ed25519 key pair for signing entity statements.
///
/// The signing key is zeroized on drop to prevent private key leakage.
pub struct FederationKey {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    kid: String,
}

impl FederationKey {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut rand::thread_rng()))
    }

    /// Reconstruct a key pair from raw signing key bytes.
    pub fn from_signing_key_bytes(bytes: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(bytes))
    }

    /// Reconstruct a key pair from a base64url-encoded signing key.
    pub fn from_base64url(encoded: &str) -> Result<Self> {
        let mut bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| FederationError::InvalidKey(format!("invalid base64url key: {e}")))?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| FederationError::InvalidKey("signing key must be 32 bytes".into()))?;
        bytes.zeroize();
        Ok(Self::from_signing_key_bytes(&array))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let kid = Jwk::from_ed25519(&verifying_key).kid.unwrap_or_default();
        Self {
            signing_key,
            verifying_key,
            kid,
        }
    }

    /// Reconstruct a verifying key from raw bytes.
    pub fn verifying_key_from_bytes(bytes: &[u8; 32]) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(bytes)
            .map_err(|e| FederationError::InvalidKey(format!("invalid verifying key: {e}")))
    }

    /// Return the verifying (public) key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Return the verifying key bytes.
    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// The key ID (JWK thumbprint).
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The signing key as a `jsonwebtoken` EdDSA key (PKCS#8 DER).
    pub fn encoding_key(&self) -> Result<EncodingKey> {
        let der = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| FederationError::InvalidKey(format!("PKCS#8 encoding failed: {e}")))?;
        Ok(EncodingKey::from_ed_der(der.as_bytes()))
    }

    /// The signing key as base64url. Caller is responsible for the secret.
    pub fn to_base64url(&self) -> String {
        let mut bytes = self.signing_key.to_bytes();
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        bytes.zeroize();
        encoded
    }

    /// The public key as a JWK.
    pub fn public_jwk(&self) -> Jwk {
        Jwk::from_ed25519(&self.verifying_key)
    }

    /// A key set holding only this key's public half.
    pub fn public_jwks(&self) -> JwkSet {
        JwkSet::with_keys(vec![self.public_jwk()])
    }
}

impl std::fmt::Debug for FederationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl Drop for FederationKey {
    fn drop(&mut self) {
        // SigningKey stores bytes internally; zeroize via conversion
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}
