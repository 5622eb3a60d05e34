//! Consultation booking routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use domain::models::consultation::{
    ApproveConsultationRequest, ConsultationEdit, ConsultationResponse,
    CreateConsultationRequest, DenyConsultationRequest, EditConsultationRequest, NewConsultation,
};
use domain::models::{BusyInterval, ConsultationStatus, StudentRef, TeacherRef, TimeWindow};
use domain::services::{CalendarError, CalendarSync, ConsultationService};
use serde::{Deserialize, Serialize};
use shared::time::format_with_offset;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{
    CalendarAccess, JsonBody, OptionalJsonBody, UserAuth, CALENDAR_TOKEN_HEADER,
};
use crate::middleware::metrics::{record_calendar_sync, record_consultation_transition};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub window: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeBusyRequest {
    pub scheduled_at: DateTime<Utc>,
}

/// Busy period rendered in the school's offset.
#[derive(Debug, Clone, Serialize)]
pub struct BusyIntervalResponse {
    pub start: String,
    pub end: String,
}

impl BusyIntervalResponse {
    fn new(interval: &BusyInterval, offset: FixedOffset) -> Self {
        Self {
            start: format_with_offset(interval.start, offset),
            end: format_with_offset(interval.end, offset),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FreeBusyResponse {
    pub start: String,
    pub end: String,
    pub free: bool,
    pub busy: Vec<BusyIntervalResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalResponse {
    pub consultation: ConsultationResponse,
    pub calendar: CalendarSync,
    /// Advisory: busy periods the approver's own calendar reported for the slot.
    pub external_busy: Vec<BusyIntervalResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgendaDayResponse {
    pub date: NaiveDate,
    pub consultations: Vec<ConsultationResponse>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<ConsultationStatus>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => Ok(Some(value.parse::<ConsultationStatus>()?)),
        None => Ok(None),
    }
}

fn respond(state: &AppState, record: &domain::models::ConsultationRecord) -> ConsultationResponse {
    ConsultationResponse::from_record(record, state.consultations.offset())
}

fn calendar_error(err: CalendarError) -> ApiError {
    match err {
        CalendarError::Unauthenticated => {
            ApiError::Validation(format!("{} header is required", CALENDAR_TOKEN_HEADER))
        }
        CalendarError::Auth(msg) => ApiError::Forbidden(msg),
        CalendarError::Network(msg) | CalendarError::Api(msg) => {
            ApiError::ServiceUnavailable(msg)
        }
    }
}

/// Request a consultation with a staff member.
///
/// POST /api/v1/consultations
pub async fn create_consultation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    JsonBody(request): JsonBody<CreateConsultationRequest>,
) -> Result<(StatusCode, Json<ConsultationResponse>), ApiError> {
    request.validate()?;

    let teacher = state.accounts.find_staff(&request.teacher_email).await?;
    let draft = NewConsultation {
        teacher: Some(TeacherRef::new(teacher.display_name(), &teacher.email)),
        student: Some(StudentRef::new(&user_auth.email, user_auth.uid.clone())),
        scheduled_at: request.scheduled_at,
        location: request.location,
        comment: request.comment,
    };

    let record = state
        .consultations
        .request(&user_auth.actor(), draft)
        .await?;
    record_consultation_transition("requested");

    Ok((StatusCode::CREATED, Json(respond(&state, &record))))
}

/// The caller's consultations.
///
/// GET /api/v1/consultations?status=&window=
pub async fn list_consultations(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ConsultationResponse>>, ApiError> {
    let status = parse_status(query.status.as_deref())?;
    let window: TimeWindow = match query.window.as_deref() {
        Some(raw) => raw.parse()?,
        None => TimeWindow::All,
    };

    let records = state
        .consultations
        .list(&user_auth.actor(), status, window)
        .await?;
    Ok(Json(records.iter().map(|r| respond(&state, r)).collect()))
}

/// Approved consultations grouped by local day.
///
/// GET /api/v1/consultations/agenda
pub async fn get_agenda(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<Vec<AgendaDayResponse>>, ApiError> {
    let days = state.consultations.agenda(&user_auth.actor()).await?;
    Ok(Json(
        days.iter()
            .map(|day| AgendaDayResponse {
                date: day.date,
                consultations: day.consultations.iter().map(|r| respond(&state, r)).collect(),
            })
            .collect(),
    ))
}

/// GET /api/v1/consultations/:id
pub async fn get_consultation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<ConsultationResponse>, ApiError> {
    let record = state.consultations.get(&user_auth.actor(), id).await?;
    Ok(Json(respond(&state, &record)))
}

/// Re-edit a pending request.
///
/// PUT /api/v1/consultations/:id
pub async fn edit_consultation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(id): Path<Uuid>,
    JsonBody(request): JsonBody<EditConsultationRequest>,
) -> Result<Json<ConsultationResponse>, ApiError> {
    request.validate()?;

    let edit = ConsultationEdit {
        scheduled_at: request.scheduled_at,
        comment: request.comment,
        reason: request.reason,
    };
    let record = state
        .consultations
        .edit(&user_auth.actor(), id, edit)
        .await?;
    record_consultation_transition("edited");

    Ok(Json(respond(&state, &record)))
}

/// Approve a pending request. The calendar event is created with the token
/// in `X-Calendar-Token` when present. The body may be omitted; if sent it
/// must be valid.
///
/// POST /api/v1/consultations/:id/approve
pub async fn approve_consultation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    calendar: CalendarAccess,
    Path(id): Path<Uuid>,
    OptionalJsonBody(body): OptionalJsonBody<ApproveConsultationRequest>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let request = body.unwrap_or_default();
    request.validate()?;

    let outcome = state
        .consultations
        .approve(
            &user_auth.actor(),
            id,
            request.comment.as_deref(),
            calendar.token(),
        )
        .await?;
    record_consultation_transition("approved");
    record_calendar_sync(&outcome.calendar);

    let offset = state.consultations.offset();
    Ok(Json(ApprovalResponse {
        consultation: respond(&state, &outcome.record),
        calendar: outcome.calendar,
        external_busy: outcome
            .external_busy
            .iter()
            .map(|b| BusyIntervalResponse::new(b, offset))
            .collect(),
    }))
}

/// POST /api/v1/consultations/:id/deny
pub async fn deny_consultation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(id): Path<Uuid>,
    JsonBody(request): JsonBody<DenyConsultationRequest>,
) -> Result<Json<ConsultationResponse>, ApiError> {
    request.validate()?;

    let record = state
        .consultations
        .deny(&user_auth.actor(), id, &request.reason)
        .await?;
    record_consultation_transition("denied");

    Ok(Json(respond(&state, &record)))
}

/// Withdraw the caller's pending request.
///
/// DELETE /api/v1/consultations/:id
pub async fn delete_consultation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .consultations
        .delete(&user_auth.actor(), id)
        .await?;
    record_consultation_transition("deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Busy periods on the caller's own calendar during a prospective slot.
///
/// POST /api/v1/consultations/free-busy
pub async fn check_free_busy(
    State(state): State<AppState>,
    _user_auth: UserAuth,
    calendar: CalendarAccess,
    JsonBody(request): JsonBody<FreeBusyRequest>,
) -> Result<Json<FreeBusyResponse>, ApiError> {
    let busy = state
        .consultations
        .check_free_busy(calendar.token(), request.scheduled_at)
        .await
        .map_err(calendar_error)?;

    let offset = state.consultations.offset();
    let slot = BusyInterval::starting_at(request.scheduled_at);
    Ok(Json(FreeBusyResponse {
        start: format_with_offset(slot.start, offset),
        end: format_with_offset(slot.end, offset),
        free: busy.is_empty(),
        busy: busy
            .iter()
            .map(|b| BusyIntervalResponse::new(b, offset))
            .collect(),
    }))
}

/// Live view of the caller's consultations as server-sent events. A
/// `snapshot` event carries the full ordered list on connect and after every
/// change that touches it.
///
/// GET /api/v1/consultations/watch?status=
pub async fn watch_consultations(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<WatchQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let mut filter = ConsultationService::filter_for(&user_auth.actor());
    filter.status = parse_status(query.status.as_deref())?;

    let offset = state.consultations.offset();
    let (publish, snapshots) = latest_only::<Vec<ConsultationResponse>>();
    let subscription = state.consultations.watch(filter, move |records| {
        publish(
            records
                .iter()
                .map(|r| ConsultationResponse::from_record(r, offset))
                .collect(),
        );
    });
    tracing::debug!(uid = %user_auth.uid, "Consultation watch opened");

    let stream = snapshots.map(move |snapshot| {
        // Dropping the stream drops the subscription and stops the watcher.
        let _live = &subscription;
        Event::default().event("snapshot").json_data(snapshot)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Publisher and stream over a single slot. A reader that falls behind
/// skips straight to the newest value.
fn latest_only<T>() -> (
    impl Fn(T) + Send + Sync + 'static,
    impl Stream<Item = T> + Send + 'static,
)
where
    T: Clone + Send + Sync + 'static,
{
    let (tx, rx) = watch::channel(None::<T>);
    let publish = move |value: T| {
        // No receiver once the client has disconnected.
        let _ = tx.send(Some(value));
    };
    (publish, WatchStream::new(rx).filter_map(|value| value))
}
