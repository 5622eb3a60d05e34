//! Consultation repository for database operations.

use domain::models::{ConsultationFilter, ConsultationRecord};
use domain::services::{ConsultationStore, ExpectedVersion};
use domain::StoreError;
use sqlx::PgPool;
use uuid::Uuid;

use super::map_error;
use crate::entities::{ConsultationEntity, ConsultationStatusDb};
use crate::metrics::QueryTimer;

const COLUMNS: &str = r#"
    id, teacher_name, teacher_email, student_email, student_uid,
    scheduled_at, ends_at, location, comment, status, reason,
    created_at, updated_at
"#;

/// Repository for consultation records.
///
/// Overlapping approved consultations of one teacher are refused by the
/// `consultations_approved_no_overlap` exclusion constraint, so two racing
/// approvals cannot both commit.
#[derive(Clone)]
pub struct ConsultationRepository {
    pool: PgPool,
}

impl ConsultationRepository {
    /// Creates a new ConsultationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn into_records(entities: Vec<ConsultationEntity>) -> Result<Vec<ConsultationRecord>, StoreError> {
    entities.into_iter().map(ConsultationRecord::try_from).collect()
}

#[async_trait::async_trait]
impl ConsultationStore for ConsultationRepository {
    async fn insert(&self, record: &ConsultationRecord) -> Result<(), StoreError> {
        let timer = QueryTimer::new("insert_consultation");
        let result = sqlx::query(
            r#"
            INSERT INTO consultations (
                id, teacher_name, teacher_email, student_email, student_uid,
                scheduled_at, ends_at, location, comment, status, reason,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.id)
        .bind(&record.teacher.name)
        .bind(&record.teacher.email)
        .bind(&record.student.email)
        .bind(&record.student.uid)
        .bind(record.scheduled_at)
        .bind(record.busy_interval().end)
        .bind(&record.location)
        .bind(&record.comment)
        .bind(ConsultationStatusDb::from(record.status))
        .bind(&record.reason)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await;
        timer.record();

        result.map_err(map_error)?;
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ConsultationRecord>, StoreError> {
        let timer = QueryTimer::new("fetch_consultation");
        let result = sqlx::query_as::<_, ConsultationEntity>(&format!(
            "SELECT {} FROM consultations WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result
            .map_err(map_error)?
            .map(ConsultationRecord::try_from)
            .transpose()
    }

    async fn list(
        &self,
        filter: &ConsultationFilter,
    ) -> Result<Vec<ConsultationRecord>, StoreError> {
        let timer = QueryTimer::new("list_consultations");
        let result = sqlx::query_as::<_, ConsultationEntity>(&format!(
            r#"
            SELECT {}
            FROM consultations
            WHERE ($1::text IS NULL OR teacher_email = $1)
              AND ($2::text IS NULL OR student_email = $2)
              AND ($3::consultation_status IS NULL OR status = $3)
            ORDER BY scheduled_at ASC, created_at ASC
            "#,
            COLUMNS
        ))
        .bind(filter.teacher_email.as_deref())
        .bind(filter.student_email.as_deref())
        .bind(filter.status.map(ConsultationStatusDb::from))
        .fetch_all(&self.pool)
        .await;
        timer.record();

        into_records(result.map_err(map_error)?)
    }

    async fn update_if(
        &self,
        record: &ConsultationRecord,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("update_consultation");
        let result = sqlx::query(
            r#"
            UPDATE consultations
            SET scheduled_at = $2,
                ends_at = $3,
                location = $4,
                comment = $5,
                status = $6,
                reason = $7,
                updated_at = $8
            WHERE id = $1 AND status = $9 AND updated_at = $10
            "#,
        )
        .bind(record.id)
        .bind(record.scheduled_at)
        .bind(record.busy_interval().end)
        .bind(&record.location)
        .bind(&record.comment)
        .bind(ConsultationStatusDb::from(record.status))
        .bind(&record.reason)
        .bind(record.updated_at)
        .bind(ConsultationStatusDb::from(expected.status))
        .bind(expected.updated_at)
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result.map_err(map_error)?.rows_affected() == 1)
    }

    async fn delete_if(&self, id: Uuid, expected: ExpectedVersion) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("delete_consultation");
        let result = sqlx::query(
            r#"
            DELETE FROM consultations
            WHERE id = $1 AND status = $2 AND updated_at = $3
            "#,
        )
        .bind(id)
        .bind(ConsultationStatusDb::from(expected.status))
        .bind(expected.updated_at)
        .execute(&self.pool)
        .await;
        timer.record();

        Ok(result.map_err(map_error)?.rows_affected() == 1)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::db::ping(&self.pool).await.map_err(map_error)
    }
}
