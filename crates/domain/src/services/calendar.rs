//! External calendar gateway.
//!
//! Approval never depends on the calendar. Free/busy answers are advisory
//! and event creation is best-effort.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::consultation::{BusyInterval, ConsultationRecord};

/// Error type for calendar calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Calendar network error: {0}")]
    Network(String),

    /// The provider refused the credentials.
    #[error("Calendar authorization failed: {0}")]
    Auth(String),

    /// No credentials were supplied at all.
    #[error("No calendar access token supplied")]
    Unauthenticated,

    #[error("Calendar API error: {0}")]
    Api(String),
}

/// OAuth access token for the approver's calendar.
#[derive(Clone, PartialEq, Eq)]
pub struct CalendarToken(String);

impl CalendarToken {
    /// Blank tokens are treated as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CalendarToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CalendarToken([REDACTED])")
    }
}

/// Free/busy query over `[time_min, time_max)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBusyQuery {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    pub time_zone: String,
}

impl FreeBusyQuery {
    pub fn for_interval(interval: &BusyInterval, time_zone: &str) -> Self {
        Self {
            time_min: interval.start,
            time_max: interval.end,
            time_zone: time_zone.to_string(),
        }
    }
}

/// Event to place on the approver's calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub time_zone: String,
}

impl CalendarEvent {
    pub fn for_consultation(record: &ConsultationRecord, time_zone: &str) -> Self {
        let interval = record.busy_interval();
        Self {
            summary: format!("Consultation with {}", record.student.email),
            description: record.comment.clone(),
            start: interval.start,
            end: interval.end,
            time_zone: time_zone.to_string(),
        }
    }
}

/// Result of the best-effort calendar sync after an approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum CalendarSync {
    Created,
    /// The provider answered but did not accept the event.
    Rejected,
    /// No token was supplied.
    Skipped,
    Failed(String),
}

impl std::fmt::Display for CalendarSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarSync::Created => write!(f, "created"),
            CalendarSync::Rejected => write!(f, "rejected"),
            CalendarSync::Skipped => write!(f, "skipped"),
            CalendarSync::Failed(_) => write!(f, "failed"),
        }
    }
}

/// Gateway to the approver's external calendar.
#[async_trait::async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Busy intervals inside the queried range.
    async fn query_free_busy(
        &self,
        token: Option<&CalendarToken>,
        query: &FreeBusyQuery,
    ) -> Result<Vec<BusyInterval>, CalendarError>;

    /// Returns whether the provider accepted the event.
    async fn create_event(
        &self,
        token: Option<&CalendarToken>,
        event: &CalendarEvent,
    ) -> Result<bool, CalendarError>;
}

/// Mock calendar gateway for development and testing.
///
/// Logs calls, answers free/busy from a scripted list and records events.
#[derive(Debug, Clone, Default)]
pub struct MockCalendarGateway {
    /// Whether to simulate network failures for testing.
    pub simulate_failure: bool,
    busy: Vec<BusyInterval>,
    events: Arc<Mutex<Vec<CalendarEvent>>>,
}

impl MockCalendarGateway {
    /// Create a new mock gateway with an empty calendar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock gateway that simulates failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Create a mock gateway whose calendar already holds `busy`.
    pub fn with_busy(busy: Vec<BusyInterval>) -> Self {
        Self {
            busy,
            ..Self::default()
        }
    }

    /// Events accepted so far.
    pub fn created_events(&self) -> Vec<CalendarEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CalendarGateway for MockCalendarGateway {
    async fn query_free_busy(
        &self,
        token: Option<&CalendarToken>,
        query: &FreeBusyQuery,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        if token.is_none() {
            return Err(CalendarError::Unauthenticated);
        }
        if self.simulate_failure {
            tracing::warn!("Mock calendar gateway simulating failure");
            return Err(CalendarError::Network("Simulated failure".to_string()));
        }

        let range = BusyInterval::new(query.time_min, query.time_max);
        let busy: Vec<BusyInterval> = self
            .busy
            .iter()
            .filter(|b| b.overlaps(&range))
            .copied()
            .collect();

        tracing::info!(
            time_min = %query.time_min,
            time_max = %query.time_max,
            busy_count = busy.len(),
            "Mock: Would query free/busy"
        );
        Ok(busy)
    }

    async fn create_event(
        &self,
        token: Option<&CalendarToken>,
        event: &CalendarEvent,
    ) -> Result<bool, CalendarError> {
        if token.is_none() {
            return Err(CalendarError::Unauthenticated);
        }
        if self.simulate_failure {
            tracing::warn!(
                summary = %event.summary,
                "Mock calendar gateway simulating failure"
            );
            return Err(CalendarError::Network("Simulated failure".to_string()));
        }

        tracing::info!(
            summary = %event.summary,
            start = %event.start,
            "Mock: Would create calendar event"
        );
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(true)
    }
}
