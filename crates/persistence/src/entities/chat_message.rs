//! Chat message entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::ChatMessage;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the chat_messages table.
#[derive(Debug, Clone, FromRow)]
pub struct ChatMessageEntity {
    pub id: Uuid,
    pub sender_id: String,
    pub sender_first_name: String,
    pub sender_last_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub reply_to_id: Option<Uuid>,
}

impl From<ChatMessageEntity> for ChatMessage {
    fn from(entity: ChatMessageEntity) -> Self {
        Self {
            id: entity.id,
            sender_id: entity.sender_id,
            sender_first_name: entity.sender_first_name,
            sender_last_name: entity.sender_last_name,
            text: entity.text,
            timestamp: entity.sent_at,
            reply_to_id: entity.reply_to_id,
        }
    }
}
