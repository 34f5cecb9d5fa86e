pub mod access_token_session;
pub mod authorization_code;
pub mod client;
pub mod refresh_token;

pub use access_token_session::AccessTokenSession;
pub use authorization_code::AuthorizationCode;
pub use client::Client;
pub use refresh_token::RefreshToken;
