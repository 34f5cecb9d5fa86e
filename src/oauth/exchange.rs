use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::bearer_auth::AuthenticatedRequest;
use crate::upstream::UpstreamCredential;

#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    pub upstream_access_token: String,
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub user_id: String,
    pub scopes: Vec<String>,
}

/// The six-step credential exchange described for `/token/privy/access-token`,
/// factored out so the orchestrator's `exchangeUpstreamToken` step can call
/// it in-process instead of looping back over HTTP to this same server.
pub async fn exchange_credential(
    state: &AppState,
    request: &AuthenticatedRequest,
) -> Result<UpstreamCredential, AppError> {
    request.require_scope("privy:token:exchange")?;

    let jti = request.claims.jti;
    let session = state
        .repositories
        .access_token_sessions
        .find_by_jti(jti)
        .await?
        .ok_or_else(|| AppError::TokenNotFound("session not found for token".to_string()))?;

    if session.upstream_user_id != request.claims.sub {
        return Err(AppError::invalid_token(
            "session does not belong to the presented token's subject",
            state.issuer_url(),
        ));
    }

    let now = Utc::now();
    if session.is_expired(now) {
        return Err(AppError::invalid_token("session has expired", state.issuer_url()));
    }

    if session.is_upstream_invalid() {
        return Err(AppError::upstream_token_invalid(state.issuer_url()));
    }

    Ok(UpstreamCredential {
        access_token: session.upstream_token,
        expires_at: session.expires_at,
        user_id: session.upstream_user_id,
        scopes: session.scopes,
    })
}

pub async fn exchange_credential_handler(
    State(state): State<AppState>,
    request: AuthenticatedRequest,
) -> Result<Json<ExchangeResponse>, AppError> {
    let credential = exchange_credential(&state, &request).await?;
    Ok(Json(ExchangeResponse {
        upstream_access_token: credential.access_token,
        expires_at: credential.expires_at,
        issued_at: Utc::now(),
        user_id: credential.user_id,
        scopes: credential.scopes,
    }))
}
