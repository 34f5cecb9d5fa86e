use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub display_name: Option<String>,
    pub redirect_uris: HashSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(id: String, display_name: Option<String>, redirect_uris: HashSet<String>) -> Self {
        Self {
            id,
            display_name,
            redirect_uris,
            created_at: Utc::now(),
        }
    }

    pub fn allows_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.contains(uri)
    }
}
