//! Profile and staff directory routes.

use axum::{
    extract::{Query, State},
    Json,
};
use domain::models::user::{ProfileResponse, StaffMember, UpdateProfileRequest};
use serde::{Deserialize, Serialize};
use shared::validation::{class_options, register_number_options};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{JsonBody, UserAuth};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffQuery {
    pub search: Option<String>,
}

/// Values offered by the class and register number pickers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileOptionsResponse {
    pub class_options: Vec<String>,
    pub register_number_options: Vec<String>,
}

/// Get the caller's profile.
///
/// GET /api/v1/users/me
pub async fn get_me(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.accounts.profile(&user_auth.uid).await?;
    Ok(Json(ProfileResponse::from(&profile)))
}

/// Update the caller's profile.
///
/// PUT /api/v1/users/me
pub async fn update_me(
    State(state): State<AppState>,
    user_auth: UserAuth,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    request.validate()?;

    let profile = state
        .accounts
        .update_profile(&user_auth.uid, &request)
        .await?;
    info!(uid = %profile.uid, "Profile updated");
    Ok(Json(ProfileResponse::from(&profile)))
}

/// Staff a student can book with.
///
/// GET /api/v1/users/staff?search=
pub async fn list_staff(
    State(state): State<AppState>,
    _user_auth: UserAuth,
    Query(query): Query<StaffQuery>,
) -> Result<Json<Vec<StaffMember>>, ApiError> {
    let staff = state
        .accounts
        .staff_directory(query.search.as_deref())
        .await?;
    Ok(Json(staff.iter().map(StaffMember::from).collect()))
}

/// GET /api/v1/users/options
pub async fn profile_options() -> Json<ProfileOptionsResponse> {
    Json(ProfileOptionsResponse {
        class_options: class_options(),
        register_number_options: register_number_options(),
    })
}
