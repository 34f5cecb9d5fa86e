use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mcp_auth_bridge_core::app::AppState;
use mcp_auth_bridge_core::app_config::{
    AppConfig, LimitsConfig, PollingConfig, StorageDriver, SynthesisPoolConfig,
};
use mcp_auth_bridge_core::crypto::JwtSigner;
use mcp_auth_bridge_core::models::Client;
use mcp_auth_bridge_core::repositories::memory::in_memory_repositories;
use mcp_auth_bridge_core::upstream::{
    Candidate, CandidatePage, ExtractIntentsResult, Intent, Pagination, SynthesisResult,
    UpstreamApi, UpstreamError,
};

const PRIVATE_KEY: &str = include_str!("../fixtures/test_rsa_private.pem");
const PUBLIC_KEY: &str = include_str!("../fixtures/test_rsa_public.pem");

pub const ISSUER: &str = "https://auth.test.example";
pub const TEST_CLIENT_ID: &str = "test-client";
pub const TEST_REDIRECT_URI: &str = "https://client.example.test/callback";

fn test_config() -> AppConfig {
    AppConfig {
        storage_driver: StorageDriver::Memory,
        database_url: None,
        issuer_url: ISSUER.to_string(),
        signing_private_key: PRIVATE_KEY.to_string(),
        signing_public_key: PUBLIC_KEY.to_string(),
        access_token_ttl_seconds: 3600,
        refresh_token_ttl_seconds: 30 * 24 * 3600,
        authorization_code_ttl_seconds: 30,
        supported_scopes: vec!["read".to_string(), "privy:token:exchange".to_string()],
        default_scopes: vec!["read".to_string(), "privy:token:exchange".to_string()],
        allowed_client_ids: vec![],
        allowed_redirect_uris: vec![],
        upstream_api_url: "https://upstream.test.example".to_string(),
        upstream_api_timeout_ms: 60_000,
        upstream_token_exchange_timeout_ms: 10_000,
        polling: PollingConfig {
            max_attempts: 8,
            base_delay_ms: 1,
            delay_step_ms: 1,
            stable_threshold: 2,
            max_total_wait_ms: 200,
        },
        synthesis_pool: SynthesisPoolConfig {
            default_concurrency: 2,
            max_concurrency: 5,
            throttle_ms: 0,
        },
        limits: LimitsConfig {
            instruction_char_limit: 4000,
            section_char_limit: 1000,
            max_connections: 50,
            pagination_limit: 100,
        },
        bind_address: "127.0.0.1:0".to_string(),
        cleanup_interval_seconds: 300,
        cors_allowed_origins: vec![],
        developer_mode: true,
    }
}

/// A scriptable fake for the upstream IdP/API. Tests push the responses they
/// want `filter_candidates`/`synthesize` to return for each successive call.
pub struct FakeUpstream {
    pub intents: Mutex<Vec<Intent>>,
    pub filter_pages: Mutex<Vec<Vec<Candidate>>>,
    pub synthesis_inflight: AtomicU32,
    pub synthesis_max_inflight: AtomicU32,
    pub fail_with_token_invalid: Mutex<bool>,
}

impl Default for FakeUpstream {
    fn default() -> Self {
        Self {
            intents: Mutex::new(vec![Intent {
                id: "intent-1".to_string(),
                label: Some("wants to discuss rust".to_string()),
            }]),
            filter_pages: Mutex::new(vec![vec![Candidate {
                user_id: "upstream-user-2".to_string(),
                name: Some("Dana".to_string()),
                avatar: None,
                matched_intent_ids: vec!["intent-1".to_string()],
            }]]),
            synthesis_inflight: AtomicU32::new(0),
            synthesis_max_inflight: AtomicU32::new(0),
            fail_with_token_invalid: Mutex::new(false),
        }
    }
}

#[async_trait]
impl UpstreamApi for FakeUpstream {
    async fn extract_intents(
        &self,
        _upstream_bearer: &str,
        _text: &str,
    ) -> Result<ExtractIntentsResult, UpstreamError> {
        if *self.fail_with_token_invalid.lock().unwrap() {
            return Err(UpstreamError::TokenInvalid);
        }
        Ok(ExtractIntentsResult {
            intents: self.intents.lock().unwrap().clone(),
            files_processed: 0,
            links_processed: 0,
            intents_generated: 1,
        })
    }

    async fn filter_candidates(
        &self,
        _upstream_bearer: &str,
        _intent_ids: &[String],
        _page: u32,
        _limit: usize,
        _exclude_discovered: bool,
    ) -> Result<CandidatePage, UpstreamError> {
        let mut pages = self.filter_pages.lock().unwrap();
        let results = if pages.is_empty() {
            Vec::new()
        } else {
            pages.remove(0)
        };
        Ok(CandidatePage {
            results,
            pagination: Pagination { has_next: false },
        })
    }

    async fn synthesize(
        &self,
        _upstream_bearer: &str,
        target_user_id: &str,
        _intent_ids: &[String],
        _character_limit: Option<usize>,
    ) -> Result<SynthesisResult, UpstreamError> {
        let current = self.synthesis_inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.synthesis_max_inflight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        self.synthesis_inflight.fetch_sub(1, Ordering::SeqCst);
        Ok(SynthesisResult {
            target_user_id: target_user_id.to_string(),
            synthesis: format!("synthesis for {target_user_id}"),
        })
    }
}

pub async fn build_test_state() -> (AppState, Arc<FakeUpstream>) {
    let config = test_config();
    let jwt_signer = Arc::new(
        JwtSigner::new(
            config.signing_private_key.as_bytes(),
            config.signing_public_key.as_bytes(),
            "test-kid".to_string(),
            config.issuer_url.clone(),
        )
        .unwrap(),
    );
    let repositories = in_memory_repositories();

    let mut redirect_uris = HashSet::new();
    redirect_uris.insert(TEST_REDIRECT_URI.to_string());
    repositories
        .clients
        .upsert(Client::new(
            TEST_CLIENT_ID.to_string(),
            Some("Test Client".to_string()),
            redirect_uris,
        ))
        .await
        .unwrap();

    let fake_upstream = Arc::new(FakeUpstream::default());
    let upstream_client: Arc<dyn UpstreamApi> = fake_upstream.clone();

    let state = AppState::new(Arc::new(config), repositories, jwt_signer, upstream_client);
    (state, fake_upstream)
}
