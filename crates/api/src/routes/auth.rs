//! Account registration and session routes.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::user::{LoginRequest, ProfileResponse, RegisterRequest};
use domain::models::UserProfile;
use serde::{Deserialize, Serialize};
use shared::jwt::Subject;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::JsonBody;

/// Token information in response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TokensResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Response body for successful registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RegisterResponse {
    pub user: ProfileResponse,
    pub requires_email_verification: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LoginResponse {
    pub user: ProfileResponse,
    pub tokens: TokensResponse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

fn issue_tokens(state: &AppState, subject: &Subject) -> Result<TokensResponse, ApiError> {
    let (access_token, _) = state
        .jwt
        .generate_access_token(subject)
        .map_err(|e| ApiError::Internal(format!("Token error: {}", e)))?;
    let (refresh_token, _) = state
        .jwt
        .generate_refresh_token(subject)
        .map_err(|e| ApiError::Internal(format!("Token error: {}", e)))?;

    Ok(TokensResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt.access_token_expiry_secs,
    })
}

fn subject_for(profile: &UserProfile) -> Subject {
    Subject::new(
        profile.uid.clone(),
        profile.email.clone(),
        profile.role().as_str(),
    )
}

/// Create an account. No session is issued until the e-mail is verified.
///
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    request.validate()?;

    let profile = state.accounts.register(&request).await?;
    info!(uid = %profile.uid, role = profile.role().as_str(), "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: ProfileResponse::from(&profile),
            requires_email_verification: true,
        }),
    ))
}

/// Sign in with e-mail and password.
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    request.validate()?;

    let profile = state
        .accounts
        .login(&request.email, &request.password)
        .await?;
    let tokens = issue_tokens(&state, &subject_for(&profile))?;

    Ok(Json(LoginResponse {
        user: ProfileResponse::from(&profile),
        tokens,
    }))
}

/// Exchange a refresh token for a fresh token pair.
///
/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> Result<Json<TokensResponse>, ApiError> {
    let claims = state
        .jwt
        .validate_refresh_token(&request.refresh_token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".to_string()))?;

    let subject = Subject::new(claims.sub, claims.email, claims.role);
    Ok(Json(issue_tokens(&state, &subject)?))
}
