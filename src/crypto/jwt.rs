use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("failed to mint token: {0}")]
    Mint(#[from] jsonwebtoken::errors::Error),
    #[error("token is expired or not yet valid")]
    Expired,
    #[error("token signature or claims invalid")]
    Invalid,
}

/// Claims carried by an access-token JWT. Mirrors the access-token session
/// row in `repositories` but never carries the upstream credential itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub jti: Uuid,
    pub scope: String,
    pub client_id: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split(' ').filter(|s| !s.is_empty()).collect()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().iter().any(|s| *s == scope)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Mints and verifies RS256 access tokens. Holds the signing keypair and the
/// `kid` published alongside it at the JWKS endpoint, so a verifier never
/// needs the private key to check a token it did not itself mint.
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    kid: String,
    issuer: String,
}

impl JwtSigner {
    pub fn new(
        private_key_pem: &[u8],
        public_key_pem: &[u8],
        kid: String,
        issuer: String,
    ) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)?;
        Ok(Self {
            encoding_key,
            decoding_key,
            kid,
            issuer,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn mint_access_token(
        &self,
        sub: &str,
        client_id: &str,
        scopes: &[String],
        ttl_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<(String, Uuid), JwtError> {
        let jti = Uuid::new_v4();
        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            aud: self.issuer.clone(),
            sub: sub.to_string(),
            jti,
            scope: scopes.join(" "),
            client_id: client_id.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + ttl_seconds,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        let token = encode(&header, &claims, &self.encoding_key)?;
        Ok((token, jti))
    }

    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.issuer.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation).map_err(
            |err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid,
            },
        )?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/test_rsa_private.pem");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/test_rsa_public.pem");

    fn signer() -> JwtSigner {
        JwtSigner::new(
            PRIVATE_KEY.as_bytes(),
            PUBLIC_KEY.as_bytes(),
            "test-kid".to_string(),
            "https://auth.example.test".to_string(),
        )
        .expect("valid test keypair")
    }

    #[test]
    fn mints_and_verifies_round_trip() {
        let signer = signer();
        let now = Utc::now();
        let (token, jti) = signer
            .mint_access_token("user-1", "client-1", &["read".to_string()], 3600, now)
            .unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.jti, jti);
        assert!(claims.has_scope("read"));
    }

    #[test]
    fn rejects_tampered_signature() {
        let signer = signer();
        let now = Utc::now();
        let (mut token, _) = signer
            .mint_access_token("user-1", "client-1", &["read".to_string()], 3600, now)
            .unwrap();
        token.push('x');
        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let signer = signer();
        let now = Utc::now() - chrono::Duration::seconds(7200);
        let (token, _) = signer
            .mint_access_token("user-1", "client-1", &["read".to_string()], 3600, now)
            .unwrap();
        assert!(matches!(signer.verify(&token), Err(JwtError::Expired)));
    }
}
