pub mod authorize;
pub mod discovery;
pub mod exchange;
pub mod introspect;
pub mod register;
pub mod token;

use axum::routing::{get, post};
use axum::Router;

use crate::app::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/.well-known/oauth-authorization-server",
            get(discovery::authorization_server_metadata),
        )
        .route(
            "/.well-known/oauth-protected-resource",
            get(discovery::protected_resource_metadata),
        )
        .route("/.well-known/jwks.json", get(discovery::jwks))
        .route("/register", post(register::register_client))
        .route("/authorize", get(authorize::authorize))
        .route("/authorize/complete", post(authorize::complete))
        .route("/token", post(token::token))
        .route("/token/introspect", post(introspect::introspect))
        .route(
            "/token/privy/access-token",
            post(exchange::exchange_credential_handler),
        )
}
