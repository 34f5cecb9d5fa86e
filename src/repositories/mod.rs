pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AccessTokenSession, AuthorizationCode, Client, RefreshToken};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage backend failure: {0}")]
    Storage(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn upsert(&self, client: Client) -> RepoResult<()>;
    async fn find_by_id(&self, id: &str) -> RepoResult<Option<Client>>;
    async fn find_by_id_and_redirect_uri(
        &self,
        id: &str,
        redirect_uri: &str,
    ) -> RepoResult<Option<Client>>;
}

#[async_trait]
pub trait AuthorizationCodeRepository: Send + Sync {
    async fn create(&self, record: AuthorizationCode) -> RepoResult<String>;
    async fn find_by_code(&self, code: &str) -> RepoResult<Option<AuthorizationCode>>;
    async fn mark_used(&self, code: &str) -> RepoResult<()>;
    async fn delete(&self, code: &str) -> RepoResult<()>;
    async fn purge_expired_or_used(&self, now: DateTime<Utc>) -> RepoResult<u64>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, record: RefreshToken) -> RepoResult<RefreshToken>;
    async fn find_by_token(&self, token: &str) -> RepoResult<Option<RefreshToken>>;
    async fn revoke_by_token(&self, token: &str, at: DateTime<Utc>) -> RepoResult<()>;
    async fn delete_by_token(&self, token: &str) -> RepoResult<()>;
    async fn revoke_all_for_user(
        &self,
        client_id: &str,
        upstream_user_id: &str,
        at: DateTime<Utc>,
    ) -> RepoResult<u64>;
    async fn purge_expired_or_revoked(&self, now: DateTime<Utc>) -> RepoResult<u64>;
}

#[async_trait]
pub trait AccessTokenSessionRepository: Send + Sync {
    async fn create(&self, record: AccessTokenSession) -> RepoResult<AccessTokenSession>;
    async fn find_by_jti(&self, jti: Uuid) -> RepoResult<Option<AccessTokenSession>>;
    async fn delete_by_jti(&self, jti: Uuid) -> RepoResult<()>;
    async fn mark_upstream_invalid(&self, jti: Uuid, at: DateTime<Utc>) -> RepoResult<()>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> RepoResult<u64>;
}

/// Bundle of the four repositories, constructed once at startup and shared
/// via `Arc` through `AppState`. Kept as a plain struct (not a trait) so the
/// concrete backend choice is made once, at construction, not per call.
#[derive(Clone)]
pub struct Repositories {
    pub clients: std::sync::Arc<dyn ClientRepository>,
    pub authorization_codes: std::sync::Arc<dyn AuthorizationCodeRepository>,
    pub refresh_tokens: std::sync::Arc<dyn RefreshTokenRepository>,
    pub access_token_sessions: std::sync::Arc<dyn AccessTokenSessionRepository>,
}

impl Repositories {
    /// Runs the four purge operations concurrently and returns per-entity counts.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> RepoResult<(u64, u64, u64)> {
        let (codes, refresh, sessions) = tokio::try_join!(
            self.authorization_codes.purge_expired_or_used(now),
            self.refresh_tokens.purge_expired_or_revoked(now),
            self.access_token_sessions.purge_expired(now),
        )?;
        Ok((codes, refresh, sessions))
    }
}
