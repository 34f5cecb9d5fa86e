use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DieselPool;
use crate::models::{AccessTokenSession, AuthorizationCode, Client, RefreshToken};
use crate::schema::{access_token_sessions, authorization_codes, clients, refresh_tokens};

use super::{
    AccessTokenSessionRepository, AuthorizationCodeRepository, ClientRepository, RepoResult,
    RefreshTokenRepository, Repositories, RepositoryError,
};

fn storage_err<E: std::fmt::Display>(err: E) -> RepositoryError {
    RepositoryError::Storage(err.to_string())
}

pub fn durable_repositories(pool: DieselPool) -> Repositories {
    let pool = Arc::new(pool);
    Repositories {
        clients: Arc::new(PgClientRepository { pool: pool.clone() }),
        authorization_codes: Arc::new(PgAuthorizationCodeRepository { pool: pool.clone() }),
        refresh_tokens: Arc::new(PgRefreshTokenRepository { pool: pool.clone() }),
        access_token_sessions: Arc::new(PgAccessTokenSessionRepository { pool }),
    }
}

#[derive(Queryable, Insertable)]
#[diesel(table_name = clients)]
struct ClientRow {
    id: String,
    display_name: Option<String>,
    redirect_uris: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<Client> for ClientRow {
    fn from(c: Client) -> Self {
        Self {
            id: c.id,
            display_name: c.display_name,
            redirect_uris: serde_json::to_value(c.redirect_uris).unwrap_or_default(),
            created_at: c.created_at,
        }
    }
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        let redirect_uris: HashSet<String> =
            serde_json::from_value(row.redirect_uris).unwrap_or_default();
        Client {
            id: row.id,
            display_name: row.display_name,
            redirect_uris,
            created_at: row.created_at,
        }
    }
}

pub struct PgClientRepository {
    pool: Arc<DieselPool>,
}

#[async_trait]
impl ClientRepository for PgClientRepository {
    async fn upsert(&self, client: Client) -> RepoResult<()> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let row: ClientRow = client.into();
        diesel::insert_into(clients::table)
            .values(&row)
            .on_conflict(clients::id)
            .do_update()
            .set((
                clients::display_name.eq(&row.display_name),
                clients::redirect_uris.eq(&row.redirect_uris),
            ))
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> RepoResult<Option<Client>> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let row = clients::table
            .find(id)
            .first::<ClientRow>(&mut conn)
            .await
            .optional()
            .map_err(storage_err)?;
        Ok(row.map(Client::from))
    }

    async fn find_by_id_and_redirect_uri(
        &self,
        id: &str,
        redirect_uri: &str,
    ) -> RepoResult<Option<Client>> {
        let found = self.find_by_id(id).await?;
        Ok(found.filter(|c| c.allows_redirect_uri(redirect_uri)))
    }
}

#[derive(Queryable, Insertable)]
#[diesel(table_name = authorization_codes)]
struct AuthorizationCodeRow {
    code: String,
    client_id: String,
    redirect_uri: String,
    upstream_user_id: String,
    upstream_token: String,
    scopes: serde_json::Value,
    code_challenge: String,
    code_challenge_method: String,
    expires_at: DateTime<Utc>,
    used: bool,
    created_at: DateTime<Utc>,
}

impl From<AuthorizationCode> for AuthorizationCodeRow {
    fn from(a: AuthorizationCode) -> Self {
        Self {
            code: a.code,
            client_id: a.client_id,
            redirect_uri: a.redirect_uri,
            upstream_user_id: a.upstream_user_id,
            upstream_token: a.upstream_token,
            scopes: serde_json::to_value(a.scopes).unwrap_or_default(),
            code_challenge: a.code_challenge,
            code_challenge_method: a.code_challenge_method,
            expires_at: a.expires_at,
            used: a.used,
            created_at: a.created_at,
        }
    }
}

impl From<AuthorizationCodeRow> for AuthorizationCode {
    fn from(row: AuthorizationCodeRow) -> Self {
        AuthorizationCode {
            code: row.code,
            client_id: row.client_id,
            redirect_uri: row.redirect_uri,
            upstream_user_id: row.upstream_user_id,
            upstream_token: row.upstream_token,
            scopes: serde_json::from_value(row.scopes).unwrap_or_default(),
            code_challenge: row.code_challenge,
            code_challenge_method: row.code_challenge_method,
            expires_at: row.expires_at,
            used: row.used,
            created_at: row.created_at,
        }
    }
}

pub struct PgAuthorizationCodeRepository {
    pool: Arc<DieselPool>,
}

#[async_trait]
impl AuthorizationCodeRepository for PgAuthorizationCodeRepository {
    async fn create(&self, record: AuthorizationCode) -> RepoResult<String> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let row: AuthorizationCodeRow = record.into();
        let code = row.code.clone();
        diesel::insert_into(authorization_codes::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(code)
    }

    async fn find_by_code(&self, code: &str) -> RepoResult<Option<AuthorizationCode>> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let row = authorization_codes::table
            .find(code)
            .first::<AuthorizationCodeRow>(&mut conn)
            .await
            .optional()
            .map_err(storage_err)?;
        Ok(row.map(AuthorizationCode::from))
    }

    async fn mark_used(&self, code: &str) -> RepoResult<()> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        diesel::update(authorization_codes::table.find(code))
            .set(authorization_codes::used.eq(true))
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, code: &str) -> RepoResult<()> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        diesel::delete(authorization_codes::table.find(code))
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn purge_expired_or_used(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let count = diesel::delete(
            authorization_codes::table
                .filter(authorization_codes::used.eq(true))
                .or_filter(authorization_codes::expires_at.lt(now)),
        )
        .execute(&mut conn)
        .await
        .map_err(storage_err)?;
        Ok(count as u64)
    }
}

#[derive(Queryable, Insertable, Clone)]
#[diesel(table_name = refresh_tokens)]
struct RefreshTokenRow {
    id: Uuid,
    token: String,
    client_id: String,
    upstream_user_id: String,
    upstream_token: String,
    scopes: serde_json::Value,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<RefreshToken> for RefreshTokenRow {
    fn from(r: RefreshToken) -> Self {
        Self {
            id: r.id,
            token: r.token,
            client_id: r.client_id,
            upstream_user_id: r.upstream_user_id,
            upstream_token: r.upstream_token,
            scopes: serde_json::to_value(r.scopes).unwrap_or_default(),
            expires_at: r.expires_at,
            revoked_at: r.revoked_at,
            created_at: r.created_at,
        }
    }
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: row.id,
            token: row.token,
            client_id: row.client_id,
            upstream_user_id: row.upstream_user_id,
            upstream_token: row.upstream_token,
            scopes: serde_json::from_value(row.scopes).unwrap_or_default(),
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            created_at: row.created_at,
        }
    }
}

pub struct PgRefreshTokenRepository {
    pool: Arc<DieselPool>,
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn create(&self, record: RefreshToken) -> RepoResult<RefreshToken> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let row: RefreshTokenRow = record.into();
        diesel::insert_into(refresh_tokens::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(row.into())
    }

    async fn find_by_token(&self, token: &str) -> RepoResult<Option<RefreshToken>> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let row = refresh_tokens::table
            .filter(refresh_tokens::token.eq(token))
            .first::<RefreshTokenRow>(&mut conn)
            .await
            .optional()
            .map_err(storage_err)?;
        Ok(row.map(RefreshToken::from))
    }

    async fn revoke_by_token(&self, token: &str, at: DateTime<Utc>) -> RepoResult<()> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        diesel::update(refresh_tokens::table.filter(refresh_tokens::token.eq(token)))
            .set(refresh_tokens::revoked_at.eq(Some(at)))
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> RepoResult<()> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        diesel::delete(refresh_tokens::table.filter(refresh_tokens::token.eq(token)))
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn revoke_all_for_user(
        &self,
        client_id: &str,
        upstream_user_id: &str,
        at: DateTime<Utc>,
    ) -> RepoResult<u64> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let count = diesel::update(
            refresh_tokens::table
                .filter(refresh_tokens::client_id.eq(client_id))
                .filter(refresh_tokens::upstream_user_id.eq(upstream_user_id))
                .filter(refresh_tokens::revoked_at.is_null()),
        )
        .set(refresh_tokens::revoked_at.eq(Some(at)))
        .execute(&mut conn)
        .await
        .map_err(storage_err)?;
        Ok(count as u64)
    }

    async fn purge_expired_or_revoked(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let count = diesel::delete(
            refresh_tokens::table
                .filter(refresh_tokens::revoked_at.is_not_null())
                .or_filter(refresh_tokens::expires_at.lt(now)),
        )
        .execute(&mut conn)
        .await
        .map_err(storage_err)?;
        Ok(count as u64)
    }
}

#[derive(Queryable, Insertable, Clone)]
#[diesel(table_name = access_token_sessions)]
struct AccessTokenSessionRow {
    id: Uuid,
    jti: Uuid,
    client_id: String,
    upstream_user_id: String,
    upstream_token: String,
    scopes: serde_json::Value,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    upstream_invalid_at: Option<DateTime<Utc>>,
}

impl From<AccessTokenSession> for AccessTokenSessionRow {
    fn from(s: AccessTokenSession) -> Self {
        Self {
            id: s.id,
            jti: s.jti,
            client_id: s.client_id,
            upstream_user_id: s.upstream_user_id,
            upstream_token: s.upstream_token,
            scopes: serde_json::to_value(s.scopes).unwrap_or_default(),
            expires_at: s.expires_at,
            created_at: s.created_at,
            upstream_invalid_at: s.upstream_invalid_at,
        }
    }
}

impl From<AccessTokenSessionRow> for AccessTokenSession {
    fn from(row: AccessTokenSessionRow) -> Self {
        AccessTokenSession {
            id: row.id,
            jti: row.jti,
            client_id: row.client_id,
            upstream_user_id: row.upstream_user_id,
            upstream_token: row.upstream_token,
            scopes: serde_json::from_value(row.scopes).unwrap_or_default(),
            expires_at: row.expires_at,
            created_at: row.created_at,
            upstream_invalid_at: row.upstream_invalid_at,
        }
    }
}

pub struct PgAccessTokenSessionRepository {
    pool: Arc<DieselPool>,
}

#[async_trait]
impl AccessTokenSessionRepository for PgAccessTokenSessionRepository {
    async fn create(&self, record: AccessTokenSession) -> RepoResult<AccessTokenSession> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let row: AccessTokenSessionRow = record.into();
        diesel::insert_into(access_token_sessions::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(row.into())
    }

    async fn find_by_jti(&self, jti: Uuid) -> RepoResult<Option<AccessTokenSession>> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let row = access_token_sessions::table
            .filter(access_token_sessions::jti.eq(jti))
            .first::<AccessTokenSessionRow>(&mut conn)
            .await
            .optional()
            .map_err(storage_err)?;
        Ok(row.map(AccessTokenSession::from))
    }

    async fn delete_by_jti(&self, jti: Uuid) -> RepoResult<()> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        diesel::delete(access_token_sessions::table.filter(access_token_sessions::jti.eq(jti)))
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn mark_upstream_invalid(&self, jti: Uuid, at: DateTime<Utc>) -> RepoResult<()> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        diesel::update(access_token_sessions::table.filter(access_token_sessions::jti.eq(jti)))
            .set(access_token_sessions::upstream_invalid_at.eq(Some(at)))
            .execute(&mut conn)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut conn = self.pool.get().await.map_err(storage_err)?;
        let count = diesel::delete(
            access_token_sessions::table.filter(access_token_sessions::expires_at.lt(now)),
        )
        .execute(&mut conn)
        .await
        .map_err(storage_err)?;
        Ok(count as u64)
    }
}
