use rand::RngCore;

/// A fresh 256-bit random authorization code, hex-encoded. Codes and refresh
/// tokens are generated independently so neither is derivable from the other.
pub fn generate_authorization_code() -> String {
    random_hex(32)
}

/// A fresh 384-bit random refresh token, hex-encoded.
pub fn generate_refresh_token() -> String {
    random_hex(48)
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex_encode(&buf)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_have_expected_length() {
        assert_eq!(generate_authorization_code().len(), 64);
        assert_eq!(generate_refresh_token().len(), 96);
    }

    #[test]
    fn codes_are_not_repeated() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_authorization_code()));
        }
    }

    #[test]
    fn codes_and_refresh_tokens_are_independent() {
        let code = generate_authorization_code();
        let refresh = generate_refresh_token();
        assert_ne!(code, refresh[..64]);
    }
}
