use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

use crate::app::AppState;
use crate::crypto::AccessTokenClaims;
use crate::error::AppError;

/// The outcome of bearer validation, attached to the request via the
/// `FromRequestParts` impl below. Holds the raw token alongside the decoded
/// claims so handlers needing the literal bearer (credential exchange) don't
/// have to re-serialize it.
#[derive(Debug, Clone)]
pub struct AuthenticatedRequest {
    pub token: String,
    pub claims: AccessTokenClaims,
}

impl AuthenticatedRequest {
    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn scopes(&self) -> Vec<&str> {
        self.claims.scopes()
    }

    pub fn require_scope(&self, scope: &str) -> Result<(), AppError> {
        if self.claims.has_scope(scope) {
            Ok(())
        } else {
            Err(AppError::InsufficientScope(format!(
                "missing required scope '{}'",
                scope
            )))
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedRequest
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AppError::invalid_token("missing bearer token", app_state.issuer_url())
                })?;

        let token = bearer.token().to_string();
        let claims = app_state
            .jwt_signer
            .verify(&token)
            .map_err(|err| AppError::invalid_token(err.to_string(), app_state.issuer_url()))?;

        Ok(AuthenticatedRequest { token, claims })
    }
}

/// Helper used by `require_scopes` returning the
/// `resource_metadata`-bearing `WWW-Authenticate` value expected on 401s.
pub fn resource_metadata_challenge(issuer_url: &str) -> String {
    format!(
        "Bearer resource_metadata=\"{}/.well-known/oauth-protected-resource\"",
        issuer_url
    )
}

/// Convenience wrapper combining extraction and scope enforcement, used by
/// handlers that need exactly one required scope.
pub async fn require_scopes(
    request: &AuthenticatedRequest,
    scopes: &[&str],
) -> Result<(), AppError> {
    for scope in scopes {
        request.require_scope(scope)?;
    }
    Ok(())
}
