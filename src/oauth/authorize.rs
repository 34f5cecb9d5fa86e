use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::AppError;
use crate::models::AuthorizationCode;

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: String,
    pub code_challenge_method: String,
}

/// Validates the authorization request and hands off to the external
/// consent UI. The consent UI is out of scope here; on success this returns
/// the validated parameters as JSON for that UI to render against, since
/// HTML rendering itself is an external collaborator.
pub async fn authorize(
    State(state): State<AppState>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, Response> {
    let redirect_error = |error: &str, description: &str| -> Response {
        let mut url = match url::Url::parse(&query.redirect_uri) {
            Ok(u) => u,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": error, "error_description": description})),
                )
                    .into_response();
            }
        };
        url.query_pairs_mut()
            .append_pair("error", error)
            .append_pair("error_description", description);
        if let Some(s) = &query.state {
            url.query_pairs_mut().append_pair("state", s);
        }
        Redirect::to(url.as_str()).into_response()
    };

    if query.response_type != "code" {
        return Err(redirect_error(
            "unsupported_response_type",
            "only the 'code' response_type is supported",
        ));
    }
    if query.code_challenge_method != "S256" {
        return Err(redirect_error(
            "invalid_request",
            "code_challenge_method must be S256",
        ));
    }
    if query.code_challenge.is_empty() {
        return Err(redirect_error("invalid_request", "code_challenge is required"));
    }

    let client = state
        .repositories
        .clients
        .find_by_id(&query.client_id)
        .await
        .map_err(AppError::from)
        .map_err(IntoResponse::into_response)?;

    let client = match client {
        Some(c) => c,
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "invalid_client",
                    "error_description": "unknown client_id",
                })),
            )
                .into_response());
        }
    };

    if !client.allows_redirect_uri(&query.redirect_uri) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "invalid_request",
                "error_description": "redirect_uri does not match a registered URI",
            })),
        )
            .into_response());
    }

    Ok(Json(serde_json::json!({
        "client_id": query.client_id,
        "redirect_uri": query.redirect_uri,
        "scope": query.scope,
        "state": query.state,
        "code_challenge": query.code_challenge,
        "code_challenge_method": query.code_challenge_method,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub upstream_token: String,
    pub fallback_upstream_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub code: String,
    pub redirect_uri: String,
    pub state: Option<String>,
}

/// Derives the upstream user id for a presented upstream credential. Real
/// upstream-token verification lives in [`crate::upstream`]; here we treat a
/// non-empty opaque token as presumptively valid and take its first
/// colon-delimited segment as the user id, matching the simple bearer shape
/// the upstream IdP issues in practice.
fn derive_upstream_user_id(token: &str) -> Option<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .split(':')
            .next()
            .unwrap_or(trimmed)
            .to_string(),
    )
}

pub async fn complete(
    State(state): State<AppState>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, AppError> {
    let client = state
        .repositories
        .clients
        .find_by_id_and_redirect_uri(&req.client_id, &req.redirect_uri)
        .await?
        .ok_or_else(|| AppError::InvalidClient("unknown client or redirect_uri".to_string()))?;

    if req.code_challenge_method != "S256" {
        return Err(AppError::InvalidRequest(
            "code_challenge_method must be S256".to_string(),
        ));
    }

    let upstream_user_id = derive_upstream_user_id(&req.upstream_token)
        .or_else(|| {
            req.fallback_upstream_token
                .as_deref()
                .and_then(derive_upstream_user_id)
        })
        .ok_or_else(|| {
            AppError::InvalidGrant("unable to verify upstream identity token".to_string())
        })?;

    let upstream_token = if derive_upstream_user_id(&req.upstream_token).is_some() {
        req.upstream_token.clone()
    } else {
        req.fallback_upstream_token.clone().unwrap_or_default()
    };

    let scopes: Vec<String> = req
        .scope
        .clone()
        .map(|s| s.split(' ').filter(|p| !p.is_empty()).map(String::from).collect())
        .unwrap_or_else(|| state.config.default_scopes.clone());

    let now = chrono::Utc::now();
    let code = crate::crypto::generate_authorization_code();
    let record = AuthorizationCode {
        code: code.clone(),
        client_id: client.id.clone(),
        redirect_uri: req.redirect_uri.clone(),
        upstream_user_id,
        upstream_token,
        scopes,
        code_challenge: req.code_challenge,
        code_challenge_method: req.code_challenge_method,
        expires_at: now + chrono::Duration::seconds(state.config.authorization_code_ttl_seconds),
        used: false,
        created_at: now,
    };
    state.repositories.authorization_codes.create(record).await?;

    let mut redirect_url = url::Url::parse(&req.redirect_uri)
        .map_err(|_| AppError::InvalidRequest("redirect_uri is not a valid URL".to_string()))?;
    redirect_url.query_pairs_mut().append_pair("code", &code);
    if let Some(s) = &req.state {
        redirect_url.query_pairs_mut().append_pair("state", s);
    }

    Ok(Json(CompleteResponse {
        code,
        redirect_uri: redirect_url.to_string(),
        state: req.state,
    }))
}
