//! Clinical note endpoints. The author-or-admin rule is enforced in
//! `rules::notes` against the verified claims.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::Claims;
use super::error::ApiError;
use crate::db::{
    ClinicalNote, ClinicalNoteWithAuthor, CreateClinicalNoteRequest, UpdateClinicalNoteRequest,
};
use crate::rules::notes;
use crate::AppState;

use super::DeletedResponse;

/// Create a clinical note authored by the caller
///
/// POST /api/clinical-notes
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(req): Json<CreateClinicalNoteRequest>,
) -> Result<(StatusCode, Json<ClinicalNote>), ApiError> {
    let note = notes::create_note(&state.db, &claims, &req).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// List all notes for one patient, newest visit first
///
/// GET /api/clinical-notes/patient/:patient_id
pub async fn list_notes_by_patient(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<ClinicalNoteWithAuthor>>, ApiError> {
    let notes = notes::list_notes_by_patient(&state.db, &patient_id).await?;
    Ok(Json(notes))
}

/// Get a clinical note by id
///
/// GET /api/clinical-notes/:id
pub async fn get_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClinicalNoteWithAuthor>, ApiError> {
    let note = notes::get_note(&state.db, &id).await?;
    Ok(Json(note))
}

/// Update a clinical note's content fields
///
/// PUT /api/clinical-notes/:id
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<String>,
    Json(req): Json<UpdateClinicalNoteRequest>,
) -> Result<Json<ClinicalNote>, ApiError> {
    let note = notes::update_note(&state.db, &claims, &id, &req).await?;
    Ok(Json(note))
}

/// Delete a clinical note
///
/// DELETE /api/clinical-notes/:id
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = notes::delete_note(&state.db, &claims, &id).await?;
    Ok(Json(DeletedResponse { id }))
}
