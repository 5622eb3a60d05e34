//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod chat_message;
pub mod consultation;
pub mod user;

pub use chat_message::ChatMessageEntity;
pub use consultation::{ConsultationEntity, ConsultationStatusDb};
pub use user::UserEntity;
