pub mod bearer_auth;
pub mod cors;

pub use bearer_auth::{require_scopes, AuthenticatedRequest};
pub use cors::build_cors_layer;
