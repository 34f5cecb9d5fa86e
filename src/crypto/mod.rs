pub mod jwks;
pub mod jwt;
pub mod pkce;
pub mod random;

pub use jwks::JwkSet;
pub use jwt::{AccessTokenClaims, JwtError, JwtSigner};
pub use pkce::verify_pkce;
pub use random::{generate_authorization_code, generate_refresh_token};
