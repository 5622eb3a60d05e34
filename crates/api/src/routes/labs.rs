//! Lab slot picker routes. Bookings are resolved, not stored.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::lab_booking::{
    slot_labels, LabBookingRequest, LAB_LOCATIONS, SLOT_MINUTES,
};
use domain::models::{LabBooking, SlotSelection};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{JsonBody, UserAuth};

#[derive(Debug, Clone, Serialize)]
pub struct LabsResponse {
    pub labs: Vec<String>,
    pub slots: Vec<String>,
    pub slot_minutes: i64,
}

/// GET /api/v1/labs
pub async fn list_labs() -> Json<LabsResponse> {
    Json(LabsResponse {
        labs: LAB_LOCATIONS.iter().map(|l| l.to_string()).collect(),
        slots: slot_labels(),
        slot_minutes: SLOT_MINUTES,
    })
}

/// Replays the taps on the slot grid and resolves the selected range.
///
/// POST /api/v1/labs/bookings
pub async fn book_lab(
    State(state): State<AppState>,
    user_auth: UserAuth,
    JsonBody(request): JsonBody<LabBookingRequest>,
) -> Result<(StatusCode, Json<LabBooking>), ApiError> {
    let mut selection = SlotSelection::new();
    for tap in &request.taps {
        selection.tap(*tap)?;
    }

    let booking = LabBooking::resolve(
        &request.lab,
        request.date,
        &selection,
        state.consultations.offset(),
    )?;
    tracing::info!(
        uid = %user_auth.uid,
        lab = %booking.lab,
        starts_at = %booking.starts_at,
        "Lab booked"
    );

    Ok((StatusCode::CREATED, Json(booking)))
}
