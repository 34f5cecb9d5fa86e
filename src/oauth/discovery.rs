use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::app::AppState;
use crate::crypto::jwks::build_jwk_set;
use crate::error::AppError;

pub async fn authorization_server_metadata(State(state): State<AppState>) -> Json<serde_json::Value> {
    let issuer = state.issuer_url();
    Json(json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/authorize"),
        "token_endpoint": format!("{issuer}/token"),
        "registration_endpoint": format!("{issuer}/register"),
        "introspection_endpoint": format!("{issuer}/token/introspect"),
        "jwks_uri": format!("{issuer}/.well-known/jwks.json"),
        "scopes_supported": state.config.supported_scopes,
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "token_endpoint_auth_methods_supported": ["none"],
        "code_challenge_methods_supported": ["S256"],
    }))
}

pub async fn protected_resource_metadata(State(state): State<AppState>) -> Json<serde_json::Value> {
    let issuer = state.issuer_url();
    Json(json!({
        "resource": issuer,
        "authorization_servers": [issuer],
        "bearer_methods_supported": ["header"],
        "scopes_supported": state.config.supported_scopes,
    }))
}

pub async fn jwks(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let set = build_jwk_set(&state.config.signing_public_key)
        .map_err(|err| AppError::ServerError(err.to_string()))?;
    Ok(Json(serde_json::to_value(set).unwrap_or_default()))
}
