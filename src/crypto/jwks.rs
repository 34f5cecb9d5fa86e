use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("invalid RSA public key: {0}")]
    InvalidKey(#[from] rsa::pkcs8::spki::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Builds the single JWK published for this signing key. `kid` is the RFC
/// 7638 thumbprint of the canonical `{"e":...,"kty":"RSA","n":...}` member,
/// so a verifier can resolve `kid` -> key without any other coordination.
pub fn build_jwk_set(public_key_pem: &str) -> Result<JwkSet, JwksError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)?;
    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    let kid = thumbprint(&n, &e);
    Ok(JwkSet {
        keys: vec![Jwk {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            alg: "RS256".to_string(),
            kid,
            n,
            e,
        }],
    })
}

fn thumbprint(n: &str, e: &str) -> String {
    let canonical = format!("{{\"e\":\"{}\",\"kty\":\"RSA\",\"n\":\"{}\"}}", e, n);
    let digest = Sha256::digest(canonical.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/test_rsa_public.pem");

    #[test]
    fn builds_one_key_with_stable_kid() {
        let set_a = build_jwk_set(PUBLIC_KEY).unwrap();
        let set_b = build_jwk_set(PUBLIC_KEY).unwrap();
        assert_eq!(set_a.keys.len(), 1);
        assert_eq!(set_a.keys[0].kid, set_b.keys[0].kid);
        assert_eq!(set_a.keys[0].kty, "RSA");
        assert_eq!(set_a.keys[0].alg, "RS256");
    }
}
