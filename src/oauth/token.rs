use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::crypto::{generate_refresh_token, verify_pkce};
use crate::error::AppError;
use crate::models::{AccessTokenSession, RefreshToken};

#[derive(Debug, Deserialize)]
#[serde(tag = "grant_type")]
#[serde(rename_all = "snake_case")]
pub enum TokenRequest {
    AuthorizationCode {
        code: String,
        code_verifier: String,
        client_id: String,
        redirect_uri: String,
    },
    RefreshToken {
        refresh_token: String,
        client_id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}

pub async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    match req {
        TokenRequest::AuthorizationCode {
            code,
            code_verifier,
            client_id,
            redirect_uri,
        } => exchange_authorization_code(&state, code, code_verifier, client_id, redirect_uri).await,
        TokenRequest::RefreshToken {
            refresh_token,
            client_id,
        } => rotate_refresh_token(&state, refresh_token, client_id).await,
    }
    .map(Json)
}

async fn exchange_authorization_code(
    state: &AppState,
    code: String,
    code_verifier: String,
    client_id: String,
    redirect_uri: String,
) -> Result<TokenResponse, AppError> {
    let record = state
        .repositories
        .authorization_codes
        .find_by_code(&code)
        .await?
        .ok_or_else(|| AppError::InvalidGrant("unknown authorization code".to_string()))?;

    let now = chrono::Utc::now();
    if !record.is_usable(now) {
        return Err(AppError::InvalidGrant(
            "authorization code is used or expired".to_string(),
        ));
    }
    if record.client_id != client_id || record.redirect_uri != redirect_uri {
        return Err(AppError::InvalidGrant(
            "client_id or redirect_uri does not match the authorization code".to_string(),
        ));
    }
    if record.code_challenge_method != "S256"
        || !verify_pkce(&code_verifier, &record.code_challenge)
    {
        return Err(AppError::InvalidGrant("PKCE verification failed".to_string()));
    }

    state.repositories.authorization_codes.delete(&code).await?;

    issue_token_pair(
        state,
        &record.client_id,
        &record.upstream_user_id,
        &record.upstream_token,
        &record.scopes,
        now,
    )
    .await
}

async fn rotate_refresh_token(
    state: &AppState,
    refresh_token: String,
    client_id: String,
) -> Result<TokenResponse, AppError> {
    let record = state
        .repositories
        .refresh_tokens
        .find_by_token(&refresh_token)
        .await?
        .ok_or_else(|| AppError::InvalidGrant("unknown refresh token".to_string()))?;

    let now = chrono::Utc::now();
    if !record.is_valid(now) || record.client_id != client_id {
        return Err(AppError::InvalidGrant(
            "refresh token is revoked, expired, or does not match client_id".to_string(),
        ));
    }

    // Rotate by deleting first: a concurrent replay of this same token will
    // now fail with `invalid_grant` rather than succeeding twice.
    state
        .repositories
        .refresh_tokens
        .delete_by_token(&refresh_token)
        .await?;

    issue_token_pair(
        state,
        &record.client_id,
        &record.upstream_user_id,
        &record.upstream_token,
        &record.scopes,
        now,
    )
    .await
}

async fn issue_token_pair(
    state: &AppState,
    client_id: &str,
    upstream_user_id: &str,
    upstream_token: &str,
    scopes: &[String],
    now: chrono::DateTime<chrono::Utc>,
) -> Result<TokenResponse, AppError> {
    let (access_token, jti) = state
        .jwt_signer
        .mint_access_token(
            upstream_user_id,
            client_id,
            scopes,
            state.config.access_token_ttl_seconds,
            now,
        )
        .map_err(|err| AppError::ServerError(err.to_string()))?;

    let new_refresh_token = generate_refresh_token();

    state
        .repositories
        .access_token_sessions
        .create(AccessTokenSession {
            id: Uuid::new_v4(),
            jti,
            client_id: client_id.to_string(),
            upstream_user_id: upstream_user_id.to_string(),
            upstream_token: upstream_token.to_string(),
            scopes: scopes.to_vec(),
            expires_at: now + chrono::Duration::seconds(state.config.access_token_ttl_seconds),
            created_at: now,
            upstream_invalid_at: None,
        })
        .await?;

    state
        .repositories
        .refresh_tokens
        .create(RefreshToken {
            id: Uuid::new_v4(),
            token: new_refresh_token.clone(),
            client_id: client_id.to_string(),
            upstream_user_id: upstream_user_id.to_string(),
            upstream_token: upstream_token.to_string(),
            scopes: scopes.to_vec(),
            expires_at: now + chrono::Duration::seconds(state.config.refresh_token_ttl_seconds),
            revoked_at: None,
            created_at: now,
        })
        .await?;

    Ok(TokenResponse {
        access_token,
        refresh_token: new_refresh_token,
        token_type: "Bearer",
        expires_in: state.config.access_token_ttl_seconds,
        scope: scopes.join(" "),
    })
}
