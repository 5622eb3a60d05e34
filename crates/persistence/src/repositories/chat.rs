//! Chat message repository for database operations.

use domain::models::ChatMessage;
use domain::services::ChatStore;
use domain::StoreError;
use sqlx::PgPool;
use uuid::Uuid;

use super::map_error;
use crate::entities::ChatMessageEntity;
use crate::metrics::QueryTimer;

/// Repository for the chat board.
#[derive(Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    /// Creates a new ChatRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChatStore for ChatRepository {
    async fn insert(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let timer = QueryTimer::new("insert_chat_message");
        let result = sqlx::query(
            r#"
            INSERT INTO chat_messages (id, sender_id, sender_first_name, sender_last_name, text, sent_at, reply_to_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id)
        .bind(&message.sender_id)
        .bind(&message.sender_first_name)
        .bind(&message.sender_last_name)
        .bind(&message.text)
        .bind(message.timestamp)
        .bind(message.reply_to_id)
        .execute(&self.pool)
        .await;
        timer.record();

        result.map_err(map_error)?;
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ChatMessage>, StoreError> {
        let timer = QueryTimer::new("fetch_chat_message");
        let result = sqlx::query_as::<_, ChatMessageEntity>(
            r#"
            SELECT id, sender_id, sender_first_name, sender_last_name, text, sent_at, reply_to_id
            FROM chat_messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        Ok(result.map_err(map_error)?.map(ChatMessage::from))
    }

    async fn list(&self) -> Result<Vec<ChatMessage>, StoreError> {
        let timer = QueryTimer::new("list_chat_messages");
        let result = sqlx::query_as::<_, ChatMessageEntity>(
            r#"
            SELECT id, sender_id, sender_first_name, sender_last_name, text, sent_at, reply_to_id
            FROM chat_messages
            ORDER BY sent_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();

        Ok(result
            .map_err(map_error)?
            .into_iter()
            .map(ChatMessage::from)
            .collect())
    }

    /// Replies are removed by the `ON DELETE CASCADE` foreign key.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("delete_chat_message");
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();

        Ok(result.map_err(map_error)?.rows_affected() > 0)
    }
}
