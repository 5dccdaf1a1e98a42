//! Compact JWS for entity statements (`alg: EdDSA`).
//!
//! Framing, header decoding and signature checks are delegated to
//! `jsonwebtoken`. Claim validation is switched off there: validity windows
//! and critical claims are checked by the resolver against its own clock.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, Header, Validation};
use serde_json::Value;

use crate::error::{FederationError, Result};
use crate::resolve::Verifier;

use super::jwk::JwkSet;
use super::keys::FederationKey;

/// Media type of an entity statement.
pub const ENTITY_STATEMENT_TYPE: &str = "entity-statement+jwt";

/// The only accepted signature algorithm.
pub const ALGORITHM: Algorithm = Algorithm::EdDSA;

fn jws_error(e: jsonwebtoken::errors::Error) -> FederationError {
    match e.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidEcdsaKey => FederationError::SignatureInvalid(e.to_string()),
        _ => FederationError::Parse(format!("malformed JWS: {e}")),
    }
}

/// `jsonwebtoken` validation with every claim check disabled.
fn signature_only() -> Validation {
    let mut validation = Validation::new(ALGORITHM);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation
}

fn require_object(claims: Value) -> Result<Value> {
    if !claims.is_object() {
        return Err(FederationError::Parse(
            "JWS payload must be a JSON object".into(),
        ));
    }
    Ok(claims)
}

/// Sign a claims object into a compact JWS.
pub fn sign_claims(claims: &Value, key: &FederationKey) -> Result<String> {
    if !claims.is_object() {
        return Err(FederationError::Parse(
            "JWS claims must be a JSON object".into(),
        ));
    }
    let mut header = Header::new(ALGORITHM);
    header.kid = Some(key.kid().to_string());
    header.typ = Some(ENTITY_STATEMENT_TYPE.into());
    encode(&header, claims, &key.encoding_key()?)
        .map_err(|e| FederationError::InvalidKey(format!("signing failed: {e}")))
}

/// A compact JWS with its header decoded, not yet verified.
#[derive(Debug, Clone)]
pub struct CompactJws<'a> {
    pub header: Header,
    raw: &'a str,
}

impl<'a> CompactJws<'a> {
    /// Decode the header of a compact JWS.
    pub fn parse(raw: &'a str) -> Result<Self> {
        let raw = raw.trim();
        if raw.split('.').count() != 3 {
            return Err(FederationError::Parse(
                "compact JWS must have three parts".into(),
            ));
        }
        let header = decode_header(raw).map_err(jws_error)?;
        Ok(Self { header, raw })
    }

    /// Decode the claims without checking the signature.
    pub fn unverified_claims(&self) -> Result<Value> {
        let mut validation = signature_only();
        validation.insecure_disable_signature_validation();
        let data = decode::<Value>(self.raw, &DecodingKey::from_secret(&[]), &validation)
            .map_err(jws_error)?;
        require_object(data.claims)
    }

    /// Verify against a key set and return the claims.
    ///
    /// With a `kid` in the header only that key is tried; otherwise every
    /// Ed25519 key in the set is.
    pub fn verify(&self, keys: &JwkSet) -> Result<Value> {
        if self.header.alg != ALGORITHM {
            return Err(FederationError::SignatureInvalid(format!(
                "unsupported JWS algorithm {:?}",
                self.header.alg
            )));
        }

        let candidates: Vec<_> = match self.header.kid.as_deref() {
            Some(kid) => keys.find_key(kid).into_iter().collect(),
            None => keys.ed25519_keys().collect(),
        };
        if candidates.is_empty() {
            return Err(FederationError::SignatureInvalid(format!(
                "no matching key for kid {:?}",
                self.header.kid
            )));
        }

        let validation = signature_only();
        for jwk in candidates {
            let Ok(key) = jwk.ed25519_key() else {
                continue;
            };
            let decoding_key = DecodingKey::from_ed_der(key.as_bytes());
            match decode::<Value>(self.raw, &decoding_key, &validation) {
                Ok(data) => return require_object(data.claims),
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => continue,
                Err(e) => return Err(jws_error(e)),
            }
        }

        Err(FederationError::SignatureInvalid(
            "no key in the set verifies the signature".into(),
        ))
    }
}

/// [`Verifier`] for Ed25519-signed compact JWS statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519JwsVerifier;

impl Verifier for Ed25519JwsVerifier {
    fn verify(&self, raw_jws: &str, keys: &JwkSet) -> Result<Value> {
        CompactJws::parse(raw_jws)?.verify(keys)
    }

    fn decode_unverified(&self, raw_jws: &str) -> Result<Value> {
        CompactJws::parse(raw_jws)?.unverified_claims()
    }
}
