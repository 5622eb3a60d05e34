//! Consultation status state machine.
//!
//! `Pending -> Approved | Denied`. Approved and denied are terminal. Owners
//! may edit or delete a record only while it is pending; editing leaves the
//! status untouched.
//!
//! Every transition is pure: it takes the current record and returns the next
//! one. Persisting the result is the caller's job.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::consultation::{
    ConsultationEdit, ConsultationRecord, ConsultationStatus, NewConsultation,
};
use crate::models::user::Actor;
use crate::services::conflict::ConflictChecker;

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusLifecycle {
    checker: ConflictChecker,
}

impl StatusLifecycle {
    pub fn new() -> Self {
        Self {
            checker: ConflictChecker::new(),
        }
    }

    /// Builds a new pending record with an empty reason.
    pub fn create(
        &self,
        draft: NewConsultation,
        now: DateTime<Utc>,
    ) -> Result<ConsultationRecord, DomainError> {
        let teacher = draft
            .teacher
            .ok_or_else(|| DomainError::validation("Teacher is required"))?;
        let student = draft
            .student
            .ok_or_else(|| DomainError::validation("Student is required"))?;
        let scheduled_at = draft
            .scheduled_at
            .ok_or_else(|| DomainError::validation("Date and time are required"))?;

        let record = ConsultationRecord {
            id: Uuid::new_v4(),
            teacher,
            student,
            scheduled_at,
            location: draft.location.trim().to_string(),
            comment: draft.comment.trim().to_string(),
            status: ConsultationStatus::Pending,
            reason: String::new(),
            created_at: now,
            updated_at: now,
        };
        record.validate()?;
        Ok(record)
    }

    /// Checks that `actor` may approve or deny `record` right now.
    pub fn ensure_can_decide(
        &self,
        record: &ConsultationRecord,
        actor: &Actor,
    ) -> Result<(), DomainError> {
        if !actor.is_staff() {
            return Err(DomainError::authorization(
                "Only staff can approve or deny consultations",
            ));
        }
        if record.teacher.email != actor.email {
            return Err(DomainError::authorization(
                "Only the requested teacher can decide on this consultation",
            ));
        }
        if !record.is_pending() {
            return Err(DomainError::state(format!(
                "Consultation is already {}",
                record.status
            )));
        }
        Ok(())
    }

    /// Approves `record` unless it overlaps one of `approved`.
    ///
    /// `approved` must come from the authoritative store, read at approval time.
    pub fn approve(
        &self,
        record: &ConsultationRecord,
        actor: &Actor,
        comment: Option<&str>,
        approved: &[ConsultationRecord],
        now: DateTime<Utc>,
    ) -> Result<ConsultationRecord, DomainError> {
        self.ensure_can_decide(record, actor)?;
        self.checker.ensure_free(record, approved)?;

        let mut next = record.clone();
        next.status = ConsultationStatus::Approved;
        next.reason = comment.map(str::trim).unwrap_or_default().to_string();
        next.updated_at = now;
        Ok(next)
    }

    pub fn deny(
        &self,
        record: &ConsultationRecord,
        actor: &Actor,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsultationRecord, DomainError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation(
                "Please provide a reason for denial",
            ));
        }
        self.ensure_can_decide(record, actor)?;

        let mut next = record.clone();
        next.status = ConsultationStatus::Denied;
        next.reason = reason.to_string();
        next.updated_at = now;
        Ok(next)
    }

    /// Replaces date and comment of the owner's pending record.
    pub fn edit(
        &self,
        record: &ConsultationRecord,
        actor: &Actor,
        edit: ConsultationEdit,
        now: DateTime<Utc>,
    ) -> Result<ConsultationRecord, DomainError> {
        self.ensure_owner_pending(record, actor, "edit")?;
        let scheduled_at = edit
            .scheduled_at
            .ok_or_else(|| DomainError::validation("Date and time are required"))?;

        let mut next = record.clone();
        next.scheduled_at = scheduled_at;
        next.comment = edit.comment.trim().to_string();
        next.reason = edit
            .reason
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        next.status = ConsultationStatus::Pending;
        next.updated_at = now;
        Ok(next)
    }

    /// Ownership is checked before status, so non-owners always get an
    /// authorization failure.
    pub fn authorize_delete(
        &self,
        record: &ConsultationRecord,
        actor: &Actor,
    ) -> Result<(), DomainError> {
        self.ensure_owner_pending(record, actor, "delete")
    }

    fn ensure_owner_pending(
        &self,
        record: &ConsultationRecord,
        actor: &Actor,
        action: &str,
    ) -> Result<(), DomainError> {
        if actor.is_staff() || !record.is_owned_by(&actor.email) {
            return Err(DomainError::authorization(format!(
                "Only the requesting student can {} this consultation",
                action
            )));
        }
        if !record.is_pending() {
            return Err(DomainError::state(format!(
                "Cannot {} a consultation that is already {}",
                action, record.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConflictDetail;
    use crate::models::consultation::{StudentRef, TeacherRef};
    use crate::models::user::Role;
    use chrono::{FixedOffset, TimeZone};

    fn sgt(hour: u32, minute: u32) -> DateTime<Utc> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 10, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn teacher() -> Actor {
        Actor::new("uid-tan", "tan@sst.edu.sg", Role::Staff)
    }

    fn other_teacher() -> Actor {
        Actor::new("uid-lim", "lim@sst.edu.sg", Role::Staff)
    }

    fn student() -> Actor {
        Actor::new("uid-jane", "jane@s2024.ssts.edu.sg", Role::Student)
    }

    fn other_student() -> Actor {
        Actor::new("uid-john", "john@s2024.ssts.edu.sg", Role::Student)
    }

    fn draft(scheduled_at: DateTime<Utc>) -> NewConsultation {
        NewConsultation {
            teacher: Some(TeacherRef::new("Mr Tan", "tan@sst.edu.sg")),
            student: Some(StudentRef::new("jane@s2024.ssts.edu.sg", "uid-jane")),
            scheduled_at: Some(scheduled_at),
            location: "Outside Staffroom".to_string(),
            comment: "Physics question".to_string(),
        }
    }

    fn pending(scheduled_at: DateTime<Utc>) -> ConsultationRecord {
        StatusLifecycle::new()
            .create(draft(scheduled_at), sgt(8, 0))
            .unwrap()
    }

    fn approved(scheduled_at: DateTime<Utc>) -> ConsultationRecord {
        let lifecycle = StatusLifecycle::new();
        lifecycle
            .approve(&pending(scheduled_at), &teacher(), None, &[], sgt(8, 0))
            .unwrap()
    }

    fn denied(scheduled_at: DateTime<Utc>) -> ConsultationRecord {
        let lifecycle = StatusLifecycle::new();
        lifecycle
            .deny(&pending(scheduled_at), &teacher(), "Busy", sgt(8, 0))
            .unwrap()
    }

    #[test]
    fn test_create_is_pending_with_empty_reason() {
        let record = pending(sgt(9, 0));
        assert_eq!(record.status, ConsultationStatus::Pending);
        assert_eq!(record.reason, "");
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_create_requires_teacher_student_and_time() {
        let lifecycle = StatusLifecycle::new();
        let now = sgt(8, 0);

        let mut missing_teacher = draft(sgt(9, 0));
        missing_teacher.teacher = None;
        assert!(matches!(
            lifecycle.create(missing_teacher, now),
            Err(DomainError::Validation(_))
        ));

        let mut missing_student = draft(sgt(9, 0));
        missing_student.student = None;
        assert!(matches!(
            lifecycle.create(missing_student, now),
            Err(DomainError::Validation(_))
        ));

        let mut missing_time = draft(sgt(9, 0));
        missing_time.scheduled_at = None;
        assert!(matches!(
            lifecycle.create(missing_time, now),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_create_then_delete_by_owner() {
        let lifecycle = StatusLifecycle::new();
        let record = pending(sgt(9, 0));
        assert!(lifecycle.authorize_delete(&record, &student()).is_ok());
    }

    #[test]
    fn test_approve_sets_optional_comment() {
        let lifecycle = StatusLifecycle::new();
        let record = pending(sgt(9, 0));

        let next = lifecycle
            .approve(&record, &teacher(), Some(" See you "), &[], sgt(8, 30))
            .unwrap();

        assert_eq!(next.status, ConsultationStatus::Approved);
        assert_eq!(next.reason, "See you");
        assert_eq!(next.id, record.id);
        assert_eq!(next.updated_at, sgt(8, 30));
    }

    #[test]
    fn test_approve_conflict_scenario() {
        let lifecycle = StatusLifecycle::new();
        let existing = vec![approved(sgt(9, 0))];

        let clash = pending(sgt(9, 15));
        let err = lifecycle
            .approve(&clash, &teacher(), None, &existing, sgt(8, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Conflict(ConflictDetail::Overlap { .. })
        ));

        let adjacent = pending(sgt(9, 30));
        let ok = lifecycle
            .approve(&adjacent, &teacher(), None, &existing, sgt(8, 0))
            .unwrap();
        assert_eq!(ok.status, ConsultationStatus::Approved);
    }

    #[test]
    fn test_approve_requires_staff_teacher() {
        let lifecycle = StatusLifecycle::new();
        let record = pending(sgt(9, 0));

        assert!(matches!(
            lifecycle.approve(&record, &student(), None, &[], sgt(8, 0)),
            Err(DomainError::Authorization(_))
        ));
        assert!(matches!(
            lifecycle.approve(&record, &other_teacher(), None, &[], sgt(8, 0)),
            Err(DomainError::Authorization(_))
        ));
    }

    #[test]
    fn test_approve_only_from_pending() {
        let lifecycle = StatusLifecycle::new();
        for record in [approved(sgt(9, 0)), denied(sgt(9, 0))] {
            assert!(matches!(
                lifecycle.approve(&record, &teacher(), None, &[], sgt(8, 0)),
                Err(DomainError::State(_))
            ));
        }
    }

    #[test]
    fn test_deny_requires_reason() {
        let lifecycle = StatusLifecycle::new();
        let record = pending(sgt(9, 0));

        for reason in ["", "   "] {
            assert!(matches!(
                lifecycle.deny(&record, &teacher(), reason, sgt(8, 0)),
                Err(DomainError::Validation(_))
            ));
        }

        let next = lifecycle
            .deny(&record, &teacher(), "On leave", sgt(8, 0))
            .unwrap();
        assert_eq!(next.status, ConsultationStatus::Denied);
        assert_eq!(next.reason, "On leave");
        assert!(next.validate().is_ok());
    }

    #[test]
    fn test_deny_only_from_pending() {
        let lifecycle = StatusLifecycle::new();
        let record = approved(sgt(9, 0));
        assert!(matches!(
            lifecycle.deny(&record, &teacher(), "Changed my mind", sgt(8, 0)),
            Err(DomainError::State(_))
        ));
    }

    #[test]
    fn test_delete_by_non_owner_always_unauthorized() {
        let lifecycle = StatusLifecycle::new();
        for record in [pending(sgt(9, 0)), approved(sgt(9, 0)), denied(sgt(9, 0))] {
            for actor in [other_student(), teacher()] {
                assert!(matches!(
                    lifecycle.authorize_delete(&record, &actor),
                    Err(DomainError::Authorization(_))
                ));
            }
        }
    }

    #[test]
    fn test_delete_by_owner_after_decision_is_state_error() {
        let lifecycle = StatusLifecycle::new();
        for record in [approved(sgt(9, 0)), denied(sgt(9, 0))] {
            assert!(matches!(
                lifecycle.authorize_delete(&record, &student()),
                Err(DomainError::State(_))
            ));
        }
    }

    #[test]
    fn test_edit_keeps_pending_and_sets_reason() {
        let lifecycle = StatusLifecycle::new();
        let record = pending(sgt(9, 0));

        let next = lifecycle
            .edit(
                &record,
                &student(),
                ConsultationEdit {
                    scheduled_at: Some(sgt(10, 0)),
                    comment: "New question".to_string(),
                    reason: Some("Clash with CCA".to_string()),
                },
                sgt(8, 30),
            )
            .unwrap();

        assert_eq!(next.status, ConsultationStatus::Pending);
        assert_eq!(next.scheduled_at, sgt(10, 0));
        assert_eq!(next.comment, "New question");
        assert_eq!(next.reason, "Clash with CCA");
        assert_eq!(next.location, record.location);
    }

    #[test]
    fn test_edit_rules() {
        let lifecycle = StatusLifecycle::new();
        let edit = || ConsultationEdit {
            scheduled_at: Some(sgt(10, 0)),
            comment: String::new(),
            reason: None,
        };

        assert!(matches!(
            lifecycle.edit(&pending(sgt(9, 0)), &other_student(), edit(), sgt(8, 0)),
            Err(DomainError::Authorization(_))
        ));
        assert!(matches!(
            lifecycle.edit(&approved(sgt(9, 0)), &student(), edit(), sgt(8, 0)),
            Err(DomainError::State(_))
        ));

        let mut no_time = edit();
        no_time.scheduled_at = None;
        assert!(matches!(
            lifecycle.edit(&pending(sgt(9, 0)), &student(), no_time, sgt(8, 0)),
            Err(DomainError::Validation(_))
        ));
    }
}
