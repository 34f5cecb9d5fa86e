use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct IntrospectRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum IntrospectResponse {
    Active {
        active: bool,
        sub: String,
        scope: String,
        client_id: String,
        exp: i64,
        iat: i64,
        iss: String,
        aud: String,
        jti: String,
    },
    Inactive {
        active: bool,
    },
}

pub async fn introspect(
    State(state): State<AppState>,
    Json(req): Json<IntrospectRequest>,
) -> Json<IntrospectResponse> {
    match state.jwt_signer.verify(&req.token) {
        Ok(claims) => Json(IntrospectResponse::Active {
            active: true,
            sub: claims.sub,
            scope: claims.scope,
            client_id: claims.client_id,
            exp: claims.exp,
            iat: claims.iat,
            iss: claims.iss,
            aud: claims.aud,
            jti: claims.jti.to_string(),
        }),
        Err(_) => Json(IntrospectResponse::Inactive { active: false }),
    }
}
