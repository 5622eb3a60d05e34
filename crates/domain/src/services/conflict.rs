//! Overlap detection between a candidate slot and approved consultations.

use uuid::Uuid;

use crate::error::{ConflictDetail, DomainError};
use crate::models::consultation::{BusyInterval, ConsultationRecord, ConsultationStatus};
use shared::validation::normalize_email;

/// Decides whether a candidate busy interval collides with a teacher's
/// approved consultations. Never mutates anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictChecker;

impl ConflictChecker {
    pub fn new() -> Self {
        Self
    }

    /// First approved record of `teacher_email` whose interval overlaps
    /// `candidate`, skipping `exclude` (the record being approved).
    pub fn find_conflict<'a>(
        &self,
        candidate: &BusyInterval,
        teacher_email: &str,
        existing: &'a [ConsultationRecord],
        exclude: Option<Uuid>,
    ) -> Option<&'a ConsultationRecord> {
        let teacher_email = normalize_email(teacher_email);
        existing.iter().find(|record| {
            record.status == ConsultationStatus::Approved
                && record.teacher.email == teacher_email
                && Some(record.id) != exclude
                && record.busy_interval().overlaps(candidate)
        })
    }

    pub fn has_conflict(
        &self,
        candidate: &BusyInterval,
        teacher_email: &str,
        existing: &[ConsultationRecord],
        exclude: Option<Uuid>,
    ) -> bool {
        self.find_conflict(candidate, teacher_email, existing, exclude)
            .is_some()
    }

    /// Fails with a conflict carrying the clashing interval if `record`
    /// cannot be approved alongside `existing`.
    pub fn ensure_free(
        &self,
        record: &ConsultationRecord,
        existing: &[ConsultationRecord],
    ) -> Result<(), DomainError> {
        match self.find_conflict(
            &record.busy_interval(),
            &record.teacher.email,
            existing,
            Some(record.id),
        ) {
            Some(clash) => Err(DomainError::Conflict(ConflictDetail::Overlap {
                consultation_id: clash.id,
                interval: clash.busy_interval(),
            })),
            None => Ok(()),
        }
    }
}
