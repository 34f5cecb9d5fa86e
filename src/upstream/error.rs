use thiserror::Error;

/// Classification of upstream call failures. `TokenInvalid` is the only
/// variant that must propagate as fatal through the orchestrator and pool.
#[derive(Debug, Error, Clone)]
pub enum UpstreamError {
    #[error("upstream token invalid")]
    TokenInvalid,
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("upstream call timed out")]
    Timeout,
    #[error("upstream transport failure: {0}")]
    Transport(String),
}

impl UpstreamError {
    pub fn is_token_invalid(&self) -> bool {
        matches!(self, UpstreamError::TokenInvalid)
    }

    /// Classifies a non-2xx upstream HTTP response, looking for the
    /// token-invalid signal in a handful of known body shapes before falling
    /// back to a plain status-code classification.
    pub fn classify(status: u16, body_snippet: &str) -> Self {
        let lowered = body_snippet.to_ascii_lowercase();
        if status == 401 || status == 403 {
            if lowered.contains("privy_token_invalid")
                || lowered.contains("invalid or expired access token")
                || lowered.contains("invalid_token")
            {
                return UpstreamError::TokenInvalid;
            }
        }
        UpstreamError::Status(status)
    }
}
