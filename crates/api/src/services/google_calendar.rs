//! Google Calendar gateway.
//!
//! Implements the CalendarGateway trait against the Calendar REST API v3,
//! authenticating with the approver's own OAuth access token.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use domain::models::BusyInterval;
use domain::services::{
    CalendarError, CalendarEvent, CalendarGateway, CalendarToken, FreeBusyQuery,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shared::time::format_with_offset;

use crate::config::CalendarConfig;

/// Calendar queried and written to.
const PRIMARY_CALENDAR: &str = "primary";

/// Google Calendar gateway using the REST API v3.
pub struct GoogleCalendarGateway {
    client: Client,
    base_url: String,
    offset: FixedOffset,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest {
    time_min: String,
    time_max: String,
    time_zone: String,
    items: Vec<CalendarItem>,
}

#[derive(Debug, Serialize)]
struct CalendarItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: std::collections::HashMap<String, CalendarBusy>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarBusy {
    #[serde(default)]
    busy: Vec<BusyPeriod>,
    #[serde(default)]
    errors: Vec<CalendarItemError>,
}

#[derive(Debug, Deserialize)]
struct BusyPeriod {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
}

#[derive(Debug, Deserialize)]
struct CalendarItemError {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventRequest {
    summary: String,
    description: String,
    start: EventDateTime,
    end: EventDateTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: String,
    time_zone: String,
}

impl GoogleCalendarGateway {
    /// Create a gateway rendering local times in `offset`.
    pub fn new(config: &CalendarConfig, offset: FixedOffset) -> Result<Self, CalendarError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| CalendarError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            offset,
        })
    }

    fn free_busy_body(&self, query: &FreeBusyQuery) -> FreeBusyRequest {
        FreeBusyRequest {
            time_min: format_with_offset(query.time_min, self.offset),
            time_max: format_with_offset(query.time_max, self.offset),
            time_zone: query.time_zone.clone(),
            items: vec![CalendarItem {
                id: PRIMARY_CALENDAR.to_string(),
            }],
        }
    }

    fn event_body(&self, event: &CalendarEvent) -> EventRequest {
        EventRequest {
            summary: event.summary.clone(),
            description: event.description.clone(),
            start: EventDateTime {
                date_time: format_with_offset(event.start, self.offset),
                time_zone: event.time_zone.clone(),
            },
            end: EventDateTime {
                date_time: format_with_offset(event.end, self.offset),
                time_zone: event.time_zone.clone(),
            },
        }
    }
}

fn require_token(token: Option<&CalendarToken>) -> Result<&CalendarToken, CalendarError> {
    token.ok_or(CalendarError::Unauthenticated)
}

fn network_error(err: reqwest::Error) -> CalendarError {
    CalendarError::Network(err.to_string())
}

/// Maps a non-success status onto the gateway error taxonomy.
fn status_error(status: StatusCode, body: String) -> CalendarError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CalendarError::Auth(format!("{}: {}", status, body))
        }
        _ => CalendarError::Api(format!("{}: {}", status, body)),
    }
}

/// Busy periods of the primary calendar. A per-calendar error (for example
/// `notFound`) is reported as an API error rather than as "free".
fn busy_intervals(response: FreeBusyResponse) -> Result<Vec<BusyInterval>, CalendarError> {
    let primary = response
        .calendars
        .into_iter()
        .find(|(id, _)| id == PRIMARY_CALENDAR)
        .map(|(_, busy)| busy)
        .unwrap_or_default();

    if let Some(err) = primary.errors.first() {
        return Err(CalendarError::Api(format!(
            "free/busy unavailable: {}",
            err.reason
        )));
    }

    Ok(primary
        .busy
        .into_iter()
        .map(|p| BusyInterval::new(p.start.with_timezone(&Utc), p.end.with_timezone(&Utc)))
        .collect())
}

#[async_trait::async_trait]
impl CalendarGateway for GoogleCalendarGateway {
    async fn query_free_busy(
        &self,
        token: Option<&CalendarToken>,
        query: &FreeBusyQuery,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let token = require_token(token)?;
        let url = format!("{}/freeBusy", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.as_str())
            .json(&self.free_busy_body(query))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let parsed: FreeBusyResponse = response.json().await.map_err(network_error)?;
        let busy = busy_intervals(parsed)?;
        tracing::debug!(busy = busy.len(), "Free/busy query answered");
        Ok(busy)
    }

    async fn create_event(
        &self,
        token: Option<&CalendarToken>,
        event: &CalendarEvent,
    ) -> Result<bool, CalendarError> {
        let token = require_token(token)?;
        let url = format!("{}/calendars/{}/events", self.base_url, PRIMARY_CALENDAR);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.as_str())
            .json(&self.event_body(event))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(summary = %event.summary, "Calendar event created");
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        let auth_failure = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN);
        if status.is_client_error() && !auth_failure {
            tracing::warn!(status = %status, body = %body, "Calendar refused the event");
            return Ok(false);
        }
        Err(status_error(status, body))
    }
}
