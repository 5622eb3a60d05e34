//! Chat board domain models.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A message on the shared chat board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: String,
    pub sender_first_name: String,
    pub sender_last_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<Uuid>,
}

impl ChatMessage {
    pub fn is_reply(&self) -> bool {
        self.reply_to_id.is_some()
    }
}

/// A root message with every reply beneath it, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatThread {
    pub root: ChatMessage,
    pub replies: Vec<ChatMessage>,
}

/// Groups messages into threads.
///
/// Replies to replies attach to the thread's root. A reply whose parent is
/// gone is shown as a root of its own.
pub fn build_threads(messages: Vec<ChatMessage>) -> Vec<ChatThread> {
    let parents: HashMap<Uuid, Option<Uuid>> =
        messages.iter().map(|m| (m.id, m.reply_to_id)).collect();

    let root_of = |message: &ChatMessage| -> Uuid {
        let mut current = message.id;
        let mut steps = 0;
        while let Some(Some(parent)) = parents.get(&current) {
            if !parents.contains_key(parent) || steps > parents.len() {
                break;
            }
            current = *parent;
            steps += 1;
        }
        current
    };

    let mut roots: Vec<ChatMessage> = Vec::new();
    let mut replies: HashMap<Uuid, Vec<ChatMessage>> = HashMap::new();
    for message in &messages {
        let root = root_of(message);
        if root == message.id {
            roots.push(message.clone());
        } else {
            replies.entry(root).or_default().push(message.clone());
        }
    }

    roots.sort_by_key(|m| m.timestamp);
    roots
        .into_iter()
        .map(|root| {
            let mut thread_replies = replies.remove(&root.id).unwrap_or_default();
            thread_replies.sort_by_key(|m| m.timestamp);
            ChatThread {
                root,
                replies: thread_replies,
            }
        })
        .collect()
}

/// Request to post a chat message.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct PostMessageRequest {
    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub text: String,

    #[serde(default)]
    pub reply_to_id: Option<Uuid>,
}
