//! Appointment endpoints. All business validation lives in
//! `rules::scheduling`; these handlers are request/response plumbing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::error::ApiError;
use crate::db::{
    Appointment, AppointmentWithNames, CreateAppointmentRequest, ListAppointmentsQuery,
    UpdateAppointmentRequest,
};
use crate::rules::scheduling;
use crate::AppState;

use super::DeletedResponse;

/// Create a new appointment
///
/// POST /api/appointments
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let appointment = scheduling::create_appointment(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// List appointments with optional filters
///
/// GET /api/appointments?patient_id=&doctor_id=&date=&status=
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<AppointmentWithNames>>, ApiError> {
    let appointments = scheduling::list_appointments(&state.db, &filters).await?;
    Ok(Json(appointments))
}

/// Get an appointment by id
///
/// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentWithNames>, ApiError> {
    let appointment = scheduling::get_appointment(&state.db, &id).await?;
    Ok(Json(appointment))
}

/// Merge-patch update of an appointment
///
/// PUT /api/appointments/:id
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let appointment = scheduling::update_appointment(&state.db, &id, &req).await?;
    Ok(Json(appointment))
}

/// Delete an appointment
///
/// DELETE /api/appointments/:id
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = scheduling::delete_appointment(&state.db, &id).await?;
    Ok(Json(DeletedResponse { id }))
}
