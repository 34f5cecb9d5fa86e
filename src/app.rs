use std::sync::Arc;

use crate::app_config::AppConfig;
use crate::crypto::JwtSigner;
use crate::repositories::Repositories;
use crate::upstream::UpstreamApi;

/// Shared application state, constructed once at startup (or once per test)
/// and threaded through every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repositories: Repositories,
    pub jwt_signer: Arc<JwtSigner>,
    pub upstream_client: Arc<dyn UpstreamApi>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        repositories: Repositories,
        jwt_signer: Arc<JwtSigner>,
        upstream_client: Arc<dyn UpstreamApi>,
    ) -> Self {
        Self {
            config,
            repositories,
            jwt_signer,
            upstream_client,
        }
    }

    pub fn issuer_url(&self) -> &str {
        &self.config.issuer_url
    }
}

/// Builds the full application state from configuration: picks the repository
/// backend, constructs the JWT signer and upstream client. Mirrors the
/// teacher's `initialize_app_state` bootstrap shape.
pub async fn initialize_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    use crate::app_config::StorageDriver;
    use crate::crypto::jwks::build_jwk_set;
    use crate::upstream::UpstreamClient;

    let jwk_set = build_jwk_set(&config.signing_public_key)?;
    let kid = jwk_set
        .keys
        .first()
        .map(|k| k.kid.clone())
        .ok_or_else(|| anyhow::anyhow!("no JWK produced from configured public key"))?;

    let jwt_signer = Arc::new(JwtSigner::new(
        config.signing_private_key.as_bytes(),
        config.signing_public_key.as_bytes(),
        kid,
        config.issuer_url.clone(),
    )?);

    let repositories = match (config.storage_driver, config.database_url.clone()) {
        (StorageDriver::Memory, _) => crate::repositories::memory::in_memory_repositories(),
        (StorageDriver::Durable, Some(database_url)) => {
            crate::db::diesel_pool::run_migrations(&database_url)?;
            let pool = crate::db::create_diesel_pool(&database_url).await?;
            crate::repositories::postgres::durable_repositories(pool)
        }
        (StorageDriver::Durable, None) => {
            tracing::warn!(
                "durable storage driver selected without DATABASE_URL, falling back to memory"
            );
            crate::repositories::memory::in_memory_repositories()
        }
    };

    let upstream_client = Arc::new(UpstreamClient::new(
        config.upstream_api_url.clone(),
        config.upstream_api_timeout_ms,
    ));

    Ok(AppState::new(
        Arc::new(config),
        repositories,
        jwt_signer,
        upstream_client,
    ))
}
