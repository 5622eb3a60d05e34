//! Shared chat board.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::chat::{build_threads, ChatMessage, ChatThread};
use crate::models::user::{Actor, UserProfile};
use crate::services::store::ChatStore;

pub struct ChatBoard {
    store: Arc<dyn ChatStore>,
}

impl ChatBoard {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    pub async fn post(
        &self,
        sender: &UserProfile,
        text: &str,
        reply_to_id: Option<Uuid>,
    ) -> Result<ChatMessage, DomainError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::validation("Message cannot be empty"));
        }
        if let Some(parent) = reply_to_id {
            if self.store.fetch(parent).await?.is_none() {
                return Err(DomainError::NotFound(format!("Message {}", parent)));
            }
        }

        let message = ChatMessage {
            id: Uuid::new_v4(),
            sender_id: sender.uid.clone(),
            sender_first_name: sender.first_name.clone(),
            sender_last_name: sender.last_name.clone(),
            text: text.to_string(),
            timestamp: Utc::now().trunc_subsecs(6),
            reply_to_id,
        };
        self.store.insert(&message).await?;

        tracing::debug!(message_id = %message.id, reply = message.is_reply(), "Chat message posted");
        Ok(message)
    }

    pub async fn threads(&self) -> Result<Vec<ChatThread>, DomainError> {
        Ok(build_threads(self.store.list().await?))
    }

    /// Senders may delete their own messages, staff any message. Replies go
    /// with their parent.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), DomainError> {
        let message = self
            .store
            .fetch(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Message {}", id)))?;

        if message.sender_id != actor.uid && !actor.is_staff() {
            return Err(DomainError::authorization(
                "You can only delete your own messages",
            ));
        }

        self.store.delete(id).await?;
        tracing::info!(message_id = %id, deleted_by = %actor.uid, "Chat message deleted");
        Ok(())
    }
}
