use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Checks `challenge == base64url(sha256(verifier))` in constant time.
/// Only the S256 method is accepted anywhere in this crate.
pub fn verify_pkce(verifier: &str, challenge: &str) -> bool {
    let digest = Sha256::digest(verifier.as_bytes());
    let computed = URL_SAFE_NO_PAD.encode(digest);
    computed.as_bytes().ct_eq(challenge.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_verifier_passes() {
        let verifier = "a-valid-code-verifier-with-enough-entropy-abc123";
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(digest);
        assert!(verify_pkce(verifier, &challenge));
    }

    #[test]
    fn wrong_verifier_fails() {
        let challenge = {
            let digest = Sha256::digest(b"right-verifier");
            URL_SAFE_NO_PAD.encode(digest)
        };
        assert!(!verify_pkce("wrong-verifier", &challenge));
    }
}
