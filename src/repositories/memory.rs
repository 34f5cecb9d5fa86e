use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AccessTokenSession, AuthorizationCode, Client, RefreshToken};

use super::{
    AccessTokenSessionRepository, AuthorizationCodeRepository, ClientRepository, RepoResult,
    RefreshTokenRepository, Repositories,
};

/// Volatile, process-local repositories backed by `RwLock<HashMap>`. No
/// external dependency; this is what every test in this crate runs against.
pub fn in_memory_repositories() -> Repositories {
    Repositories {
        clients: Arc::new(MemoryClientRepository::default()),
        authorization_codes: Arc::new(MemoryAuthorizationCodeRepository::default()),
        refresh_tokens: Arc::new(MemoryRefreshTokenRepository::default()),
        access_token_sessions: Arc::new(MemoryAccessTokenSessionRepository::default()),
    }
}

#[derive(Default)]
pub struct MemoryClientRepository {
    clients: RwLock<HashMap<String, Client>>,
}

#[async_trait]
impl ClientRepository for MemoryClientRepository {
    async fn upsert(&self, client: Client) -> RepoResult<()> {
        self.clients.write().await.insert(client.id.clone(), client);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> RepoResult<Option<Client>> {
        Ok(self.clients.read().await.get(id).cloned())
    }

    async fn find_by_id_and_redirect_uri(
        &self,
        id: &str,
        redirect_uri: &str,
    ) -> RepoResult<Option<Client>> {
        let found = self.clients.read().await.get(id).cloned();
        Ok(found.filter(|c| c.allows_redirect_uri(redirect_uri)))
    }
}

#[derive(Default)]
pub struct MemoryAuthorizationCodeRepository {
    codes: RwLock<HashMap<String, AuthorizationCode>>,
}

#[async_trait]
impl AuthorizationCodeRepository for MemoryAuthorizationCodeRepository {
    async fn create(&self, record: AuthorizationCode) -> RepoResult<String> {
        let code = record.code.clone();
        self.codes.write().await.insert(code.clone(), record);
        Ok(code)
    }

    async fn find_by_code(&self, code: &str) -> RepoResult<Option<AuthorizationCode>> {
        Ok(self.codes.read().await.get(code).cloned())
    }

    async fn mark_used(&self, code: &str) -> RepoResult<()> {
        if let Some(record) = self.codes.write().await.get_mut(code) {
            record.used = true;
        }
        Ok(())
    }

    async fn delete(&self, code: &str) -> RepoResult<()> {
        self.codes.write().await.remove(code);
        Ok(())
    }

    async fn purge_expired_or_used(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, record| !record.used && now < record.expires_at);
        Ok((before - codes.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokenRepository {
    tokens: RwLock<HashMap<String, RefreshToken>>,
}

#[async_trait]
impl RefreshTokenRepository for MemoryRefreshTokenRepository {
    async fn create(&self, record: RefreshToken) -> RepoResult<RefreshToken> {
        self.tokens
            .write()
            .await
            .insert(record.token.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_token(&self, token: &str) -> RepoResult<Option<RefreshToken>> {
        Ok(self.tokens.read().await.get(token).cloned())
    }

    async fn revoke_by_token(&self, token: &str, at: DateTime<Utc>) -> RepoResult<()> {
        if let Some(record) = self.tokens.write().await.get_mut(token) {
            record.revoked_at = Some(at);
        }
        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> RepoResult<()> {
        self.tokens.write().await.remove(token);
        Ok(())
    }

    async fn revoke_all_for_user(
        &self,
        client_id: &str,
        upstream_user_id: &str,
        at: DateTime<Utc>,
    ) -> RepoResult<u64> {
        let mut tokens = self.tokens.write().await;
        let mut count = 0u64;
        for record in tokens.values_mut() {
            if record.client_id == client_id
                && record.upstream_user_id == upstream_user_id
                && record.revoked_at.is_none()
            {
                record.revoked_at = Some(at);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn purge_expired_or_revoked(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, record| record.revoked_at.is_none() && now < record.expires_at);
        Ok((before - tokens.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryAccessTokenSessionRepository {
    sessions: RwLock<HashMap<Uuid, AccessTokenSession>>,
}

#[async_trait]
impl AccessTokenSessionRepository for MemoryAccessTokenSessionRepository {
    async fn create(&self, record: AccessTokenSession) -> RepoResult<AccessTokenSession> {
        self.sessions.write().await.insert(record.jti, record.clone());
        Ok(record)
    }

    async fn find_by_jti(&self, jti: Uuid) -> RepoResult<Option<AccessTokenSession>> {
        Ok(self.sessions.read().await.get(&jti).cloned())
    }

    async fn delete_by_jti(&self, jti: Uuid) -> RepoResult<()> {
        self.sessions.write().await.remove(&jti);
        Ok(())
    }

    async fn mark_upstream_invalid(&self, jti: Uuid, at: DateTime<Utc>) -> RepoResult<()> {
        if let Some(record) = self.sessions.write().await.get_mut(&jti) {
            record.upstream_invalid_at = Some(at);
        }
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn client_lookup_respects_redirect_uri() {
        let repo = MemoryClientRepository::default();
        let mut uris = HashSet::new();
        uris.insert("https://example.test/cb".to_string());
        repo.upsert(Client::new("client-1".to_string(), None, uris))
            .await
            .unwrap();

        assert!(repo
            .find_by_id_and_redirect_uri("client-1", "https://example.test/cb")
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .find_by_id_and_redirect_uri("client-1", "https://evil.test/cb")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn authorization_code_single_use() {
        let repo = MemoryAuthorizationCodeRepository::default();
        let record = AuthorizationCode {
            code: "abc".to_string(),
            client_id: "client-1".to_string(),
            redirect_uri: "https://example.test/cb".to_string(),
            upstream_user_id: "user-1".to_string(),
            upstream_token: "upstream-tok".to_string(),
            scopes: vec!["read".to_string()],
            code_challenge: "challenge".to_string(),
            code_challenge_method: "S256".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(30),
            used: false,
            created_at: Utc::now(),
        };
        repo.create(record).await.unwrap();
        repo.mark_used("abc").await.unwrap();
        let fetched = repo.find_by_code("abc").await.unwrap().unwrap();
        assert!(!fetched.is_usable(Utc::now()));
    }

    #[tokio::test]
    async fn revoke_all_for_user_only_touches_matching_rows() {
        let repo = MemoryRefreshTokenRepository::default();
        let now = Utc::now();
        let make = |token: &str, user: &str| RefreshToken {
            id: Uuid::new_v4(),
            token: token.to_string(),
            client_id: "client-1".to_string(),
            upstream_user_id: user.to_string(),
            upstream_token: "upstream-tok".to_string(),
            scopes: vec!["read".to_string()],
            expires_at: now + chrono::Duration::days(30),
            revoked_at: None,
            created_at: now,
        };
        repo.create(make("tok-a", "user-1")).await.unwrap();
        repo.create(make("tok-b", "user-2")).await.unwrap();

        let revoked = repo
            .revoke_all_for_user("client-1", "user-1", now)
            .await
            .unwrap();
        assert_eq!(revoked, 1);
        assert!(!repo
            .find_by_token("tok-a")
            .await
            .unwrap()
            .unwrap()
            .is_valid(now));
        assert!(repo
            .find_by_token("tok-b")
            .await
            .unwrap()
            .unwrap()
            .is_valid(now));
    }
}
