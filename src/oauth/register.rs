use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::AppError;
use crate::models::Client;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub redirect_uris: Vec<String>,
    pub client_name: Option<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub client_id: String,
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
}

fn validate_redirect_uri(uri: &str, developer_mode: bool) -> Result<(), AppError> {
    let parsed = url::Url::parse(uri)
        .map_err(|_| AppError::InvalidRequest(format!("redirect_uri '{uri}' is not a valid URL")))?;
    if !developer_mode && parsed.scheme() != "https" {
        return Err(AppError::InvalidRequest(format!(
            "redirect_uri '{uri}' must use https outside developer mode"
        )));
    }
    Ok(())
}

pub async fn register_client(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if req.redirect_uris.is_empty() {
        return Err(AppError::InvalidRequest(
            "redirect_uris must not be empty".to_string(),
        ));
    }
    for uri in &req.redirect_uris {
        validate_redirect_uri(uri, state.config.developer_mode)?;
    }

    let grant_types = if req.grant_types.is_empty() {
        vec!["authorization_code".to_string(), "refresh_token".to_string()]
    } else {
        req.grant_types.clone()
    };
    for grant_type in &grant_types {
        if grant_type != "authorization_code" && grant_type != "refresh_token" {
            return Err(AppError::InvalidRequest(format!(
                "unsupported grant_type '{grant_type}'"
            )));
        }
    }

    let response_types = if req.response_types.is_empty() {
        vec!["code".to_string()]
    } else {
        req.response_types.clone()
    };
    for response_type in &response_types {
        if response_type != "code" {
            return Err(AppError::InvalidRequest(format!(
                "unsupported response_type '{response_type}'"
            )));
        }
    }

    let client_id = format!("client_{}", Uuid::new_v4().simple());
    let redirect_uris: HashSet<String> = req.redirect_uris.iter().cloned().collect();
    let client = Client::new(client_id.clone(), req.client_name.clone(), redirect_uris);
    state.repositories.clients.upsert(client).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            client_id,
            client_name: req.client_name,
            redirect_uris: req.redirect_uris,
            grant_types,
            response_types,
        }),
    ))
}
