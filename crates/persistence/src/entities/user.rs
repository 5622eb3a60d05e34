//! User profile entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::UserProfile;
use sqlx::FromRow;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub uid: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub class_name: String,
    pub register_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserEntity> for UserProfile {
    fn from(entity: UserEntity) -> Self {
        Self {
            uid: entity.uid,
            first_name: entity.first_name,
            last_name: entity.last_name,
            email: entity.email,
            class_name: entity.class_name,
            register_number: entity.register_number,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
