pub mod pool;
pub mod polling;

use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::{map_upstream_error, AppError};
use crate::middleware::bearer_auth::AuthenticatedRequest;
use crate::oauth::exchange::exchange_credential;

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionUser {
    pub id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    pub user: ConnectionUser,
    pub mutual_intent_count: usize,
    pub synthesis: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverConnectionsResult {
    pub connections: Vec<Connection>,
    pub intents: Vec<String>,
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

/// Implements the full "discover connections" workflow: credential exchange,
/// intent extraction, accumulate-and-stabilize polling, and the
/// bounded-concurrency synthesis pool. A fatal `UpstreamTokenInvalid`
/// anywhere in this pipeline propagates as [`AppError::UpstreamTokenInvalid`]
/// for the caller (the tool dispatcher) to translate into a reauth signal.
pub async fn discover_connections(
    state: &AppState,
    auth: &AuthenticatedRequest,
    input_text: &str,
    max_connections: usize,
    character_limit: Option<usize>,
) -> Result<DiscoverConnectionsResult, AppError> {
    let max_connections = max_connections.min(state.config.limits.max_connections).max(1);

    // Step 1: credential exchange (in-process, not a loopback HTTP call).
    let credential = exchange_credential(state, auth).await?;
    let upstream_bearer = credential.access_token;

    // Step 2: intent extraction.
    let truncated_input = truncate(input_text, state.config.limits.instruction_char_limit);
    let extraction = state
        .upstream_client
        .extract_intents(&upstream_bearer, &truncated_input)
        .await
        .map_err(|err| map_upstream_error(err, state.issuer_url()))?;

    if extraction.intents.is_empty() {
        return Ok(DiscoverConnectionsResult {
            connections: Vec::new(),
            intents: Vec::new(),
        });
    }
    let intent_ids: Vec<String> = extraction.intents.iter().map(|i| i.id.clone()).collect();

    // Step 3: accumulate-and-stabilize polling.
    let accumulated = polling::accumulate_and_stabilize(
        state.upstream_client.as_ref(),
        &upstream_bearer,
        &intent_ids,
        max_connections,
        state.config.limits.pagination_limit,
        &state.config.polling,
    )
    .await
    .map_err(|err| map_upstream_error(err, state.issuer_url()))?;

    if accumulated.is_empty() {
        return Ok(DiscoverConnectionsResult {
            connections: Vec::new(),
            intents: intent_ids,
        });
    }

    // Step 4: bounded-concurrency synthesis.
    let synthesis_by_user = pool::synthesize_all(
        state.upstream_client.clone(),
        Arc::new(upstream_bearer),
        Arc::new(intent_ids.clone()),
        &accumulated,
        character_limit,
        &state.config.synthesis_pool,
    )
    .await
    .map_err(|err| map_upstream_error(err, state.issuer_url()))?;

    // Step 5: shape output, preserving first-poll insertion order.
    let connections = accumulated
        .into_iter()
        .map(|candidate| Connection {
            mutual_intent_count: candidate.matched_intent_ids.len(),
            synthesis: synthesis_by_user
                .get(&candidate.user_id)
                .cloned()
                .unwrap_or_default(),
            user: ConnectionUser {
                id: candidate.user_id,
                name: candidate.name,
                avatar: candidate.avatar,
            },
        })
        .collect();

    Ok(DiscoverConnectionsResult {
        connections,
        intents: intent_ids,
    })
}
