//! Chat board routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::chat::PostMessageRequest;
use domain::models::{ChatMessage, ChatThread};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{JsonBody, UserAuth};

/// Every thread, oldest root first.
///
/// GET /api/v1/chat/messages
pub async fn list_threads(
    State(state): State<AppState>,
    _user_auth: UserAuth,
) -> Result<Json<Vec<ChatThread>>, ApiError> {
    Ok(Json(state.chat.threads().await?))
}

/// Post a message, optionally as a reply.
///
/// POST /api/v1/chat/messages
pub async fn post_message(
    State(state): State<AppState>,
    user_auth: UserAuth,
    JsonBody(request): JsonBody<PostMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    request.validate()?;

    let sender = state.accounts.profile(&user_auth.uid).await?;
    let message = state
        .chat
        .post(&sender, &request.text, request.reply_to_id)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /api/v1/chat/messages/:id
pub async fn delete_message(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.chat.delete(&user_auth.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
