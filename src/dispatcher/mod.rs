pub mod types;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::bearer_auth::{resource_metadata_challenge, AuthenticatedRequest};
use crate::orchestrator::discover_connections;

use types::{JsonRpcRequest, JsonRpcResponse, ToolCallParams, ToolResult};

pub fn router() -> Router<AppState> {
    Router::new().route("/mcp", post(handle_rpc))
}

async fn handle_rpc(
    State(state): State<AppState>,
    auth: AuthenticatedRequest,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    if request.method != "tools/call" {
        return Json(JsonRpcResponse::error(
            request.id,
            -32601,
            format!("unknown method '{}'", request.method),
        ));
    }

    let params: ToolCallParams = match serde_json::from_value(request.params.clone()) {
        Ok(p) => p,
        Err(err) => {
            return Json(JsonRpcResponse::error(
                request.id,
                -32602,
                format!("invalid params: {err}"),
            ))
        }
    };

    let result = match params.name.as_str() {
        "discover_connections" => dispatch_discover_connections(&state, &auth, params).await,
        other => Ok(ToolResult::error_text(format!("unknown tool '{other}'"), None)),
    };

    match result {
        Ok(tool_result) => Json(JsonRpcResponse::success(request.id, tool_result)),
        Err(err) => Json(JsonRpcResponse::error(request.id, -32000, err.to_string())),
    }
}

async fn dispatch_discover_connections(
    state: &AppState,
    auth: &AuthenticatedRequest,
    params: ToolCallParams,
) -> Result<ToolResult, AppError> {
    auth.require_scope("read")?;

    let input_text = params
        .arguments
        .get("fullInputText")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::InvalidRequest("fullInputText is required".to_string()))?
        .to_string();
    let max_connections = params
        .arguments
        .get("maxConnections")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(state.config.limits.max_connections);
    let character_limit = params
        .arguments
        .get("characterLimit")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize);

    match discover_connections(state, auth, &input_text, max_connections, character_limit).await {
        Ok(discovery) => Ok(ToolResult::success(&discovery)),
        Err(AppError::UpstreamTokenInvalid { .. }) => {
            handle_upstream_invalidation(state, auth).await;
            Ok(ToolResult::error_text(
                "Your connection has expired. Please sign in again.".to_string(),
                Some(resource_metadata_challenge(state.issuer_url())),
            ))
        }
        Err(other) => Ok(ToolResult::error_text(other.to_string(), None)),
    }
}

/// The reauth side effects: quarantine the session that produced the
/// invalid-upstream-token signal and revoke every refresh token for the same
/// user/client pair, so the client's next silent refresh fails too.
async fn handle_upstream_invalidation(state: &AppState, auth: &AuthenticatedRequest) {
    let now = Utc::now();
    let jti = auth.claims.jti;
    if let Err(err) = state
        .repositories
        .access_token_sessions
        .mark_upstream_invalid(jti, now)
        .await
    {
        tracing::error!(error = %err, "failed to mark session upstream-invalid");
    }
    if let Err(err) = state
        .repositories
        .refresh_tokens
        .revoke_all_for_user(&auth.claims.client_id, &auth.claims.sub, now)
        .await
    {
        tracing::error!(error = %err, "failed to revoke refresh tokens after upstream invalidation");
    }
}
