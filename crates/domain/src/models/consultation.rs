//! Consultation domain models.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;
use shared::time::{format_with_offset, local_date};
use shared::validation::normalize_email;

/// Every consultation occupies this many minutes from its start.
pub const CONSULTATION_DURATION_MINUTES: i64 = 30;

/// Suggested meeting places offered to students.
pub const LOCATION_OPTIONS: [&str; 6] = [
    "Outside Staffroom",
    "Classroom (specify in comments)",
    "Outside Labs (Level 1)",
    "Outside Labs (Level 2)",
    "Online",
    "Others (in comments)",
];

/// Fixed length of a consultation.
pub fn consultation_duration() -> Duration {
    Duration::minutes(CONSULTATION_DURATION_MINUTES)
}

/// Status of a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    #[default]
    Pending,
    Approved,
    Denied,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::Approved => "approved",
            ConsultationStatus::Denied => "denied",
        }
    }
}

impl std::fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConsultationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ConsultationStatus::Pending),
            "approved" => Ok(ConsultationStatus::Approved),
            "denied" => Ok(ConsultationStatus::Denied),
            other => Err(DomainError::validation(format!(
                "Unknown consultation status '{}'",
                other
            ))),
        }
    }
}

/// Staff member a consultation is booked with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherRef {
    pub name: String,
    pub email: String,
}

impl TeacherRef {
    pub fn new(name: impl Into<String>, email: &str) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: normalize_email(email),
        }
    }
}

/// Student who requested a consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRef {
    pub email: String,
    pub uid: String,
}

impl StudentRef {
    pub fn new(email: &str, uid: impl Into<String>) -> Self {
        Self {
            email: normalize_email(email),
            uid: uid.into(),
        }
    }
}

/// Half-open time range `[start, end)` during which a teacher is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Interval covered by a consultation starting at `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self::new(start, start + consultation_duration())
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &BusyInterval) -> bool {
        self.start < other.end && self.end > other.start
    }
}

impl std::fmt::Display for BusyInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, false),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, false)
        )
    }
}

/// A consultation between a student and a staff member.
///
/// `status` changes only through [`crate::services::lifecycle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationRecord {
    pub id: Uuid,
    pub teacher: TeacherRef,
    pub student: StudentRef,
    pub scheduled_at: DateTime<Utc>,
    pub location: String,
    pub comment: String,
    pub status: ConsultationStatus,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConsultationRecord {
    pub fn busy_interval(&self) -> BusyInterval {
        BusyInterval::starting_at(self.scheduled_at)
    }

    pub fn is_pending(&self) -> bool {
        self.status == ConsultationStatus::Pending
    }

    pub fn is_owned_by(&self, email: &str) -> bool {
        self.student.email == normalize_email(email)
    }

    /// Checks the record-level invariants.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.teacher.email.trim().is_empty() {
            return Err(DomainError::validation("Teacher is required"));
        }
        if self.student.email.trim().is_empty() {
            return Err(DomainError::validation("Student is required"));
        }
        if self.status == ConsultationStatus::Denied && self.reason.trim().is_empty() {
            return Err(DomainError::validation(
                "A denied consultation must carry a reason",
            ));
        }
        Ok(())
    }
}

/// Input for creating a consultation. Missing parts fail validation.
#[derive(Debug, Clone, Default)]
pub struct NewConsultation {
    pub teacher: Option<TeacherRef>,
    pub student: Option<StudentRef>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub location: String,
    pub comment: String,
}

/// Fields a student may change on a pending consultation.
#[derive(Debug, Clone)]
pub struct ConsultationEdit {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub comment: String,
    pub reason: Option<String>,
}

/// Equality filter over the consultation collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsultationFilter {
    pub teacher_email: Option<String>,
    pub student_email: Option<String>,
    pub status: Option<ConsultationStatus>,
}

impl ConsultationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_teacher(email: &str) -> Self {
        Self {
            teacher_email: Some(normalize_email(email)),
            ..Self::default()
        }
    }

    pub fn for_student(email: &str) -> Self {
        Self {
            student_email: Some(normalize_email(email)),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ConsultationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, record: &ConsultationRecord) -> bool {
        self.teacher_email
            .as_deref()
            .map_or(true, |email| record.teacher.email == email)
            && self
                .student_email
                .as_deref()
                .map_or(true, |email| record.student.email == email)
            && self.status.map_or(true, |status| record.status == status)
    }
}

/// Upcoming/past split used by consultation lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    #[default]
    All,
    Upcoming,
    Past,
}

impl TimeWindow {
    pub fn contains(&self, record: &ConsultationRecord, now: DateTime<Utc>) -> bool {
        match self {
            TimeWindow::All => true,
            TimeWindow::Upcoming => record.scheduled_at > now,
            TimeWindow::Past => record.scheduled_at <= now,
        }
    }
}

impl std::str::FromStr for TimeWindow {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(TimeWindow::All),
            "upcoming" | "future" => Ok(TimeWindow::Upcoming),
            "past" => Ok(TimeWindow::Past),
            other => Err(DomainError::validation(format!(
                "Unknown time window '{}'",
                other
            ))),
        }
    }
}

/// Approved consultations on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaDay {
    pub date: NaiveDate,
    pub consultations: Vec<ConsultationRecord>,
}

/// Groups records by local calendar day, days and entries in time order.
pub fn group_by_day(mut records: Vec<ConsultationRecord>, offset: FixedOffset) -> Vec<AgendaDay> {
    records.sort_by_key(|r| r.scheduled_at);

    let mut days: Vec<AgendaDay> = Vec::new();
    for record in records {
        let date = local_date(record.scheduled_at, offset);
        match days.last_mut() {
            Some(day) if day.date == date => day.consultations.push(record),
            _ => days.push(AgendaDay {
                date,
                consultations: vec![record],
            }),
        }
    }
    days
}

/// Request to book a consultation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateConsultationRequest {
    #[validate(email(message = "Teacher email must be a valid email address"))]
    pub teacher_email: String,

    pub scheduled_at: Option<DateTime<Utc>>,

    #[serde(default)]
    #[validate(length(max = 100, message = "Location must be at most 100 characters"))]
    pub location: String,

    #[serde(default)]
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: String,
}

/// Request to re-edit a pending consultation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct EditConsultationRequest {
    pub scheduled_at: Option<DateTime<Utc>>,

    #[serde(default)]
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Request to approve a consultation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ApproveConsultationRequest {
    #[serde(default)]
    #[validate(length(max = 500, message = "Comment must be at most 500 characters"))]
    pub comment: Option<String>,
}

/// Request to deny a consultation.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct DenyConsultationRequest {
    #[serde(default)]
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: String,
}

/// Consultation as returned to clients, times rendered in the school's offset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ConsultationResponse {
    pub id: Uuid,
    pub teacher_name: String,
    pub teacher_email: String,
    pub student_email: String,
    pub student_uid: String,
    pub scheduled_at: String,
    pub ends_at: String,
    pub location: String,
    pub comment: String,
    pub status: ConsultationStatus,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConsultationResponse {
    pub fn from_record(record: &ConsultationRecord, offset: FixedOffset) -> Self {
        let interval = record.busy_interval();
        Self {
            id: record.id,
            teacher_name: record.teacher.name.clone(),
            teacher_email: record.teacher.email.clone(),
            student_email: record.student.email.clone(),
            student_uid: record.student.uid.clone(),
            scheduled_at: format_with_offset(interval.start, offset),
            ends_at: format_with_offset(interval.end, offset),
            location: record.location.clone(),
            comment: record.comment.clone(),
            status: record.status,
            reason: record.reason.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
