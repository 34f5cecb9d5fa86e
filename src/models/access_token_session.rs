use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenSession {
    pub id: Uuid,
    pub jti: Uuid,
    pub client_id: String,
    pub upstream_user_id: String,
    pub upstream_token: String,
    pub scopes: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub upstream_invalid_at: Option<DateTime<Utc>>,
}

impl AccessTokenSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_upstream_invalid(&self) -> bool {
        self.upstream_invalid_at.is_some()
    }
}
