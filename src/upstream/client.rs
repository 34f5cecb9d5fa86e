use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::UpstreamError;

/// The subset of the upstream IdP/API surface the orchestrator depends on.
/// Object-safe so tests can substitute a fake that returns scripted
/// responses without standing up an HTTP server, matching the exact
/// accumulate-and-stabilize and bounded-concurrency scenarios.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    async fn extract_intents(
        &self,
        upstream_bearer: &str,
        text: &str,
    ) -> Result<ExtractIntentsResult, UpstreamError>;

    async fn filter_candidates(
        &self,
        upstream_bearer: &str,
        intent_ids: &[String],
        page: u32,
        limit: usize,
        exclude_discovered: bool,
    ) -> Result<CandidatePage, UpstreamError>;

    async fn synthesize(
        &self,
        upstream_bearer: &str,
        target_user_id: &str,
        intent_ids: &[String],
        character_limit: Option<usize>,
    ) -> Result<SynthesisResult, UpstreamError>;
}

/// The upstream credential returned by a successful credential exchange,
/// used as the bearer for every subsequent upstream API call.
#[derive(Debug, Clone)]
pub struct UpstreamCredential {
    pub access_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub user_id: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Intent {
    pub id: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractIntentsResult {
    pub intents: Vec<Intent>,
    #[serde(default)]
    pub files_processed: u32,
    #[serde(default)]
    pub links_processed: u32,
    #[serde(default)]
    pub intents_generated: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub user_id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub matched_intent_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub has_next: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidatePage {
    pub results: Vec<Candidate>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisResult {
    pub target_user_id: String,
    pub synthesis: String,
}

/// Thin typed wrapper around the upstream IdP/API's HTTP surface. Every
/// method classifies non-2xx responses into [`UpstreamError`] so callers
/// never have to inspect status codes themselves.
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    call_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(base_url: String, call_timeout_ms: u64) -> Self {
        Self {
            http: Client::new(),
            base_url,
            call_timeout: Duration::from_millis(call_timeout_ms),
        }
    }

    async fn post_json(
        &self,
        path: &str,
        bearer: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, UpstreamError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(bearer)
            .json(&body)
            .timeout(self.call_timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    UpstreamError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let snippet = response.text().await.unwrap_or_default();
            return Err(UpstreamError::classify(status.as_u16(), &snippet));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|err| UpstreamError::Transport(err.to_string()))
    }

}

#[async_trait]
impl UpstreamApi for UpstreamClient {
    async fn extract_intents(
        &self,
        upstream_bearer: &str,
        text: &str,
    ) -> Result<ExtractIntentsResult, UpstreamError> {
        let value = self
            .post_json("/discover/new", upstream_bearer, json!({ "text": text }))
            .await?;
        serde_json::from_value(value).map_err(|err| UpstreamError::Transport(err.to_string()))
    }

    async fn filter_candidates(
        &self,
        upstream_bearer: &str,
        intent_ids: &[String],
        page: u32,
        limit: usize,
        exclude_discovered: bool,
    ) -> Result<CandidatePage, UpstreamError> {
        let value = self
            .post_json(
                "/discover/filter",
                upstream_bearer,
                json!({
                    "intentIds": intent_ids,
                    "page": page,
                    "limit": limit,
                    "excludeDiscovered": exclude_discovered,
                }),
            )
            .await?;
        serde_json::from_value(value).map_err(|err| UpstreamError::Transport(err.to_string()))
    }

    async fn synthesize(
        &self,
        upstream_bearer: &str,
        target_user_id: &str,
        intent_ids: &[String],
        character_limit: Option<usize>,
    ) -> Result<SynthesisResult, UpstreamError> {
        let value = self
            .post_json(
                "/discover/synthesize",
                upstream_bearer,
                json!({
                    "targetUserId": target_user_id,
                    "intentIds": intent_ids,
                    "characterLimit": character_limit,
                }),
            )
            .await?;
        serde_json::from_value(value).map_err(|err| UpstreamError::Transport(err.to_string()))
    }
}
