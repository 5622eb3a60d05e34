//! User JWT authentication extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use domain::models::{Actor, Role};

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated caller, taken from the Bearer access token.
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// Identity provider UID from the `sub` claim.
    pub uid: String,
    pub email: String,
    pub role: Role,
    /// JWT ID (jti) for session tracking.
    pub jti: String,
}

impl UserAuth {
    pub fn actor(&self) -> Actor {
        Actor::new(self.uid.clone(), &self.email, self.role)
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = bearer_token(auth_header).ok_or_else(|| {
            ApiError::Unauthorized("Invalid Authorization header format".to_string())
        })?;

        let claims = state
            .jwt
            .validate_access_token(token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        let role: Role = claims
            .role
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(UserAuth {
            uid: claims.sub,
            email: claims.email,
            role,
            jti: claims.jti,
        })
    }
}
