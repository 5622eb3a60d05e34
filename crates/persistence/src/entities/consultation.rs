//! Consultation entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{ConsultationRecord, ConsultationStatus, StudentRef, TeacherRef};
use domain::StoreError;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for consultation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "consultation_status", rename_all = "lowercase")]
pub enum ConsultationStatusDb {
    Pending,
    Approved,
    Denied,
}

impl From<ConsultationStatusDb> for ConsultationStatus {
    fn from(status: ConsultationStatusDb) -> Self {
        match status {
            ConsultationStatusDb::Pending => ConsultationStatus::Pending,
            ConsultationStatusDb::Approved => ConsultationStatus::Approved,
            ConsultationStatusDb::Denied => ConsultationStatus::Denied,
        }
    }
}

impl From<ConsultationStatus> for ConsultationStatusDb {
    fn from(status: ConsultationStatus) -> Self {
        match status {
            ConsultationStatus::Pending => ConsultationStatusDb::Pending,
            ConsultationStatus::Approved => ConsultationStatusDb::Approved,
            ConsultationStatus::Denied => ConsultationStatusDb::Denied,
        }
    }
}

/// Database row mapping for the consultations table.
#[derive(Debug, Clone, FromRow)]
pub struct ConsultationEntity {
    pub id: Uuid,
    pub teacher_name: String,
    pub teacher_email: String,
    pub student_email: String,
    pub student_uid: String,
    pub scheduled_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: String,
    pub comment: String,
    pub status: ConsultationStatusDb,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ConsultationEntity> for ConsultationRecord {
    type Error = StoreError;

    /// Rows written outside this service may break record invariants; those
    /// surface as [`StoreError::Corrupt`] rather than as a record.
    fn try_from(entity: ConsultationEntity) -> Result<Self, Self::Error> {
        let record = ConsultationRecord {
            id: entity.id,
            teacher: TeacherRef::new(entity.teacher_name, &entity.teacher_email),
            student: StudentRef::new(&entity.student_email, entity.student_uid),
            scheduled_at: entity.scheduled_at,
            location: entity.location,
            comment: entity.comment,
            status: entity.status.into(),
            reason: entity.reason,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        };

        record.validate().map_err(|e| StoreError::Corrupt {
            id: entity.id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(record)
    }
}
