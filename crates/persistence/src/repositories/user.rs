//! User profile repository for database operations.

use domain::models::UserProfile;
use domain::services::UserStore;
use domain::StoreError;
use shared::validation::normalize_email;
use sqlx::PgPool;

use super::map_error;
use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

/// Repository for user profiles.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for UserRepository {
    /// Insert or replace the profile keyed by uid. A second account claiming
    /// an existing e-mail is rejected by the unique index.
    async fn upsert(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let timer = QueryTimer::new("upsert_user");
        let result = sqlx::query(
            r#"
            INSERT INTO users (uid, first_name, last_name, email, class_name, register_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (uid) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                email = EXCLUDED.email,
                class_name = EXCLUDED.class_name,
                register_number = EXCLUDED.register_number,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&profile.uid)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(normalize_email(&profile.email))
        .bind(&profile.class_name)
        .bind(&profile.register_number)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await;
        timer.record();

        result.map_err(map_error)?;
        Ok(())
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        let timer = QueryTimer::new("find_user_by_uid");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT uid, first_name, last_name, email, class_name, register_number,
                   created_at, updated_at
            FROM users
            WHERE uid = $1
            "#,
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        Ok(result.map_err(map_error)?.map(UserProfile::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT uid, first_name, last_name, email, class_name, register_number,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        Ok(result.map_err(map_error)?.map(UserProfile::from))
    }

    async fn list_staff(&self) -> Result<Vec<UserProfile>, StoreError> {
        let timer = QueryTimer::new("list_staff");
        let result = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT uid, first_name, last_name, email, class_name, register_number,
                   created_at, updated_at
            FROM users
            WHERE lower(class_name) = 'staff'
            ORDER BY first_name ASC, last_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();

        Ok(result
            .map_err(map_error)?
            .into_iter()
            .map(UserProfile::from)
            .collect())
    }
}
